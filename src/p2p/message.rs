use serde::{Deserialize, Serialize};

use super::peer::PeerError;
use crate::blockchain::Block;
use crate::transaction::Transaction;

/// Messages exchanged between nodes, one JSON document per line:
/// `{"type": "QUERY_LATEST"}`, `{"type": "RESPONSE_BLOCKCHAIN", "data": [...]}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    QueryLatest,
    QueryAll,
    ResponseBlockchain(Vec<Block>),
    QueryTransactionPool,
    ResponseTransactionPool(Vec<Transaction>),
}

impl PeerMessage {
    pub fn encode_line(&self) -> Result<String, PeerError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| PeerError::Encode(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, PeerError> {
        serde_json::from_str(line.trim()).map_err(|e| PeerError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let line = PeerMessage::QueryLatest.encode_line().unwrap();
        assert_eq!(line, "{\"type\":\"QUERY_LATEST\"}\n");

        let line = PeerMessage::ResponseBlockchain(vec![Block::genesis()])
            .encode_line()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "RESPONSE_BLOCKCHAIN");
        assert_eq!(value["data"][0]["index"], 0);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let msg = PeerMessage::ResponseTransactionPool(Block::genesis().transactions);
        let line = msg.encode_line().unwrap();
        assert_eq!(PeerMessage::decode(&line).unwrap(), msg);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            PeerMessage::decode("{\"type\":\"SHOUT\"}"),
            Err(PeerError::Decode(_))
        ));
        assert!(matches!(PeerMessage::decode("not json"), Err(PeerError::Decode(_))));
    }
}
