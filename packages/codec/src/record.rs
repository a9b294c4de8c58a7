//! The JSON payload carried inside a blob.

use bytes::Bytes;
use packfs_core::{FileInfo, Namespace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Payload {
    pub namespace: Namespace,
    pub entries: Vec<Record>,
}

/// One tree entry. Directories carry no content.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Record {
    pub path: String,
    pub info: FileInfo,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "content")]
    pub content: Option<Bytes>,
}

/// Leaf bytes as standard base64 inside the JSON payload.
mod content {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match content {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        STANDARD
            .decode(encoded.as_bytes())
            .map(|raw| Some(Bytes::from(raw)))
            .map_err(|e| D::Error::custom(format!("invalid leaf content: {e}")))
    }
}
