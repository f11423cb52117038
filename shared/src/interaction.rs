use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Solution, WalletId};

/// client -> server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Command {
    GetCurrentChallenge {},
    Submission(Submission),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub wallet_id: String,
    /// Decimal string, as the server expects.
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<u64>,
}

impl Submission {
    pub fn new(wallet: &WalletId, solution: &Solution) -> Self {
        Self {
            wallet_id: wallet.to_string(),
            nonce: solution.nonce.to_string(),
            challenge_id: solution.challenge_id,
        }
    }
}

impl Command {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// server -> client
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Challenge(Challenge),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(default)]
    pub challenge_id: Option<u64>,
    pub challenge_name: String,
    pub last_solution_hash: String,
    pub hash_prefix: String,
    #[serde(default)]
    pub parameters: ChallengeParameters,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_elements: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_blockers: Option<i64>,
}

/// Any message carrying `challenge_name` must decode as a full challenge;
/// everything else is passed through untouched.
pub fn parse_server_message(text: &str) -> serde_json::Result<ServerMessage> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("challenge_name").is_some() {
        Ok(ServerMessage::Challenge(serde_json::from_value(value)?))
    } else {
        Ok(ServerMessage::Other(value))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn commands_serialize_like_the_server_expects() {
        let get = Command::GetCurrentChallenge {}.to_json().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&get).unwrap(),
            json!({"command": "get_current_challenge", "args": {}})
        );

        let solution = Solution {
            challenge_id: Some(4),
            nonce: 18446744073709551615,
            last_solution_hash: "00".into(),
        };
        let submit =
            Command::Submission(Submission::new(&WalletId("abc".into()), &solution)).to_json().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&submit).unwrap(),
            json!({"command": "submission", "args": {
                "wallet_id": "abc",
                "nonce": "18446744073709551615",
                "challenge_id": 4
            }})
        );
    }

    #[test]
    fn parses_sorted_list_challenge() {
        let text = r#"{
            "challenge_id": 12,
            "challenge_name": "sorted_list",
            "last_solution_hash": "0000000000000000000000000000000000000000000000000000000000000000",
            "hash_prefix": "9e16",
            "parameters": {"nb_elements": 100},
            "time_left": 60
        }"#;
        let ServerMessage::Challenge(challenge) = parse_server_message(text).unwrap() else {
            panic!("expected a challenge");
        };
        assert_eq!(challenge.challenge_id, Some(12));
        assert_eq!(challenge.challenge_name, "sorted_list");
        assert_eq!(challenge.hash_prefix, "9e16");
        assert_eq!(challenge.parameters.nb_elements, Some(100));
        assert_eq!(challenge.parameters.grid_size, None);
    }

    #[test]
    fn parses_shortest_path_challenge() {
        let text = r#"{"challenge_name": "shortest_path", "last_solution_hash": "ab",
            "hash_prefix": "00", "parameters": {"grid_size": 25, "nb_blockers": 80}}"#;
        let ServerMessage::Challenge(challenge) = parse_server_message(text).unwrap() else {
            panic!("expected a challenge");
        };
        assert_eq!(challenge.challenge_id, None);
        assert_eq!(challenge.parameters.grid_size, Some(25));
        assert_eq!(challenge.parameters.nb_blockers, Some(80));
    }

    #[test]
    fn non_challenge_messages_pass_through() {
        let message = parse_server_message(r#"{"result": "ok"}"#).unwrap();
        assert!(matches!(message, ServerMessage::Other(_)));
    }

    #[test]
    fn malformed_challenge_is_an_error() {
        assert!(parse_server_message(r#"{"challenge_name": "sorted_list"}"#).is_err());
        assert!(parse_server_message("not json").is_err());
    }
}
