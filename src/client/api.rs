//! Wire types for the lightmining API
//!
//! The remote contract is fixed: every route wraps its payload in a
//! `data` envelope. Numeric fields arrive as numbers or strings depending
//! on the route version, so reward amounts use a tolerant deserializer.

use serde::{Deserialize, Deserializer};

/// Envelope every API route responds with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub code: Option<i64>,
    pub data: T,
    #[serde(default)]
    pub msg: Option<String>,
}

/// `POST /wallet/generateNonce` payload
#[derive(Debug, Clone, Deserialize)]
pub struct NonceData {
    pub nonce: String,
}

/// `POST /wallet/login` payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub token: String,
}

/// `GET /user/getUserInfo` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: i64,
    pub wallet_address: String,
    pub invitation_code: String,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub reward_amount: f64,
    #[serde(deserialize_with = "de_f64_flexible")]
    pub total_reward: f64,
    #[serde(default)]
    pub invite_count: i64,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub tg_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub dc_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub tw_id: Option<String>,
}

/// `GET /assignment/totalMiningTime` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningTime {
    /// Unix seconds of the last activation; absent before the first one
    #[serde(default)]
    pub last_mining_time: Option<i64>,
    #[serde(default)]
    pub total_mining_time: i64,
}

/// One entry of `POST /assignment/list`
#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub title: String,
    pub done: bool,
    #[serde(default, deserialize_with = "de_f64_flexible")]
    pub reward: f64,
    #[serde(default)]
    pub url: Option<String>,
}

/// Accept `1.5`, `"1.5"` or null (as 0).
fn de_f64_flexible<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

/// Accept a string, a number, or null for optional social IDs.
fn de_opt_stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_parses_string_rewards() {
        let raw = r#"{
            "code": 200,
            "data": {
                "userId": 42,
                "walletAddress": "0xabc",
                "invitationCode": "XYZ",
                "rewardAmount": "12.5",
                "totalReward": 99.25,
                "inviteCount": 3,
                "tgId": 123456
            },
            "msg": "ok"
        }"#;

        let parsed: ApiResponse<UserInfo> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.reward_amount, 12.5);
        assert_eq!(parsed.data.total_reward, 99.25);
        assert_eq!(parsed.data.tg_id.as_deref(), Some("123456"));
        assert!(parsed.data.dc_id.is_none());
    }

    #[test]
    fn test_mining_time_tolerates_missing_last() {
        let raw = r#"{"data": {"totalMiningTime": 7200}}"#;
        let parsed: ApiResponse<MiningTime> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.last_mining_time, None);
        assert_eq!(parsed.data.total_mining_time, 7200);

        let raw = r#"{"data": {"lastMiningTime": 1700000000, "totalMiningTime": 7200}}"#;
        let parsed: ApiResponse<MiningTime> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.last_mining_time, Some(1_700_000_000));
    }

    #[test]
    fn test_assignment_list() {
        let raw = r#"{"data": [
            {"title": "Follow on X", "done": true, "reward": "10"},
            {"title": "Join Discord", "done": false, "reward": 5, "url": "https://example.com"}
        ]}"#;

        let parsed: ApiResponse<Vec<Assignment>> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].reward, 10.0);
        assert_eq!(parsed.data[1].url.as_deref(), Some("https://example.com"));
    }
}
