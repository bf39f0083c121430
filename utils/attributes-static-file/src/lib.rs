/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use async_trait::async_trait;
use channel_fork::{AttributeError, AttributeValue, Attributes};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::{self, canonicalize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Default)]
struct Store {
    values: HashMap<String, Option<AttributeValue>>,
    read_only: HashSet<String>,
}

/// In-memory attribute store seeded from a JSON (or JSON5) object.
///
/// String values become [`AttributeValue::Text`], arrays of strings become
/// [`AttributeValue::TextList`], `null` registers the attribute without a
/// value. Anything else is skipped with a warning.
#[derive(Default)]
pub struct AttributesStaticFile {
    store: Mutex<Store>,
}

impl AttributesStaticFile {
    pub fn new(static_file: String) -> Result<Self, AttributeError> {
        let path = PathBuf::from(static_file);
        debug!("attributes file: {path:?}");

        let path = canonicalize(&path).map_err(|e| {
            AttributeError::Unavailable(format!("Static attributes file not found: {e:?}"))
        })?;
        let data = fs::read_to_string(path)
            .map_err(|e| AttributeError::Unavailable(format!("Unable to read file: {e:?}")))?;

        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, AttributeError> {
        let parsed: Value = json5::from_str(data)
            .map_err(|e| AttributeError::Unavailable(format!("Unable to parse JSON: {e:?}")))?;

        let Some(object) = parsed.as_object() else {
            return Err(AttributeError::Unavailable(
                "Attributes file must contain a JSON object".to_string(),
            ));
        };

        let mut store = Store::default();
        for (name, value) in object {
            match to_attribute_value(value) {
                Some(value) => {
                    debug!("attribute {name} = {value:?}");
                    store.values.insert(name.clone(), value);
                }
                None => warn!("Skipping attribute '{name}' with unsupported value {value}"),
            }
        }

        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Makes later `set` calls on `name` fail with `NotWriteable`.
    pub async fn mark_read_only(&self, name: &str) {
        self.store.lock().await.read_only.insert(name.to_string());
    }

    /// Current value of every registered attribute.
    pub async fn snapshot(&self) -> HashMap<String, Option<AttributeValue>> {
        self.store.lock().await.values.clone()
    }
}

fn to_attribute_value(value: &Value) -> Option<Option<AttributeValue>> {
    match value {
        Value::Null => Some(None),
        Value::String(text) => Some(Some(AttributeValue::Text(text.clone()))),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(|list| Some(AttributeValue::TextList(list))),
        _ => None,
    }
}

#[async_trait]
impl Attributes for AttributesStaticFile {
    async fn add(&self, name: &str) -> Result<(), AttributeError> {
        let mut store = self.store.lock().await;
        if store.values.contains_key(name) {
            return Err(AttributeError::Registration {
                name: name.to_string(),
                reason: "already registered".to_string(),
            });
        }
        store.values.insert(name.to_string(), None);
        Ok(())
    }

    async fn has(&self, name: &str) -> bool {
        self.store.lock().await.values.contains_key(name)
    }

    async fn get(&self, name: &str) -> Result<Option<AttributeValue>, AttributeError> {
        self.store
            .lock()
            .await
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))
    }

    async fn set(&self, name: &str, value: AttributeValue) -> Result<(), AttributeError> {
        let mut store = self.store.lock().await;
        if store.read_only.contains(name) {
            return Err(AttributeError::NotWriteable(name.to_string()));
        }
        match store.values.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(AttributeError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AttributesStaticFile;
    use channel_fork::{
        AttributeError, AttributeValue, Attributes, FORKED_CHANNELS, INCOMING_CHANNEL,
        MESSAGE_FILTER,
    };

    #[tokio::test]
    async fn loads_testdata_file() {
        let attributes =
            AttributesStaticFile::new("static-configs/testdata.json".to_string()).unwrap();

        assert_eq!(
            attributes.get_text(INCOMING_CHANNEL).await.unwrap(),
            "test-fork"
        );
        assert_eq!(
            attributes.get_text(MESSAGE_FILTER).await.unwrap(),
            "$.sensoridentifier"
        );
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let result = AttributesStaticFile::new("static-configs/missing.json".to_string());

        assert!(matches!(result, Err(AttributeError::Unavailable(_))));
    }

    #[tokio::test]
    async fn json5_values_are_typed() {
        let attributes = AttributesStaticFile::from_json_str(
            r#"{
                // comments are allowed
                "incoming-channel": "in",
                "forked-channels": ["ndn:/in/a"],
                "message-filter": null,
                "unsupported": 42,
            }"#,
        )
        .unwrap();

        assert_eq!(
            attributes.get(FORKED_CHANNELS).await.unwrap(),
            Some(AttributeValue::TextList(vec!["ndn:/in/a".to_string()]))
        );
        assert_eq!(attributes.get(MESSAGE_FILTER).await.unwrap(), None);
        assert!(!attributes.has("unsupported").await);

        let snapshot = attributes.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot.get(INCOMING_CHANNEL),
            Some(&Some(AttributeValue::Text("in".to_string())))
        );
    }

    #[tokio::test]
    async fn read_only_attribute_rejects_set() {
        let attributes = AttributesStaticFile::default();
        attributes.add(FORKED_CHANNELS).await.unwrap();
        attributes.mark_read_only(FORKED_CHANNELS).await;

        let result = attributes
            .set(FORKED_CHANNELS, AttributeValue::TextList(Vec::new()))
            .await;

        assert_eq!(
            result,
            Err(AttributeError::NotWriteable(FORKED_CHANNELS.to_string()))
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let attributes = AttributesStaticFile::default();
        attributes.add("x").await.unwrap();

        assert!(matches!(
            attributes.add("x").await,
            Err(AttributeError::Registration { .. })
        ));
    }

    #[tokio::test]
    async fn set_on_unregistered_attribute_fails() {
        let attributes = AttributesStaticFile::default();

        assert_eq!(
            attributes
                .set("nope", AttributeValue::Text("v".to_string()))
                .await,
            Err(AttributeError::NotFound("nope".to_string()))
        );
    }
}
