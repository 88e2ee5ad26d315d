//! Action markers embedded in agent replies.
//!
//! The agent signals the client out-of-band by appending literal tags such
//! as `[ACTION:GET_SCORE]` to its free-text reply. Classification is plain
//! substring matching, checked in a fixed priority order.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

pub const GET_SCORE_MARKER: &str = "[ACTION:GET_SCORE]";
pub const VERIFY_KYC_MARKER: &str = "[ACTION:VERIFY_KYC]";
pub const OFFER_SANCTION_PREFIX: &str = "[ACTION:OFFER_SANCTION";

static OFFER_SANCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ACTION:OFFER_SANCTION\|(.*?)]").expect("Invalid sanction regex"));

static ANY_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ACTION:.*?\]").expect("Invalid marker regex"));

/// Loan terms carried by an `OFFER_SANCTION` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanOffer {
    pub name: String,
    pub amount: String,
    pub interest_rate: String,
}

#[derive(Deserialize)]
struct RawOffer {
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    interest_rate: Option<String>,
}

/// Accept strings, numbers, or null for offer fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl LoanOffer {
    /// Parse the JSON payload of a sanction marker.
    ///
    /// Missing fields fall back to the same defaults the letter endpoint uses.
    pub fn from_json(payload: &str) -> Option<Self> {
        let raw: RawOffer = serde_json::from_str(payload.trim()).ok()?;
        Some(Self {
            name: raw.name.unwrap_or_else(|| "Valued Customer".to_string()),
            amount: raw.amount.unwrap_or_else(|| "N/A".to_string()),
            interest_rate: raw.interest_rate.unwrap_or_else(|| "N/A".to_string()),
        })
    }
}

/// Client-side actions the agent can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    GetScore,
    VerifyKyc,
    OfferSanction(LoanOffer),
}

/// An agent reply after marker handling: display text plus what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyShape {
    GetScore { text: String },
    VerifyKyc { text: String },
    OfferSanction { text: String, offer: LoanOffer },
    Plain { text: String },
}

impl ReplyShape {
    pub fn classify(reply: &str) -> Self {
        if reply.contains(GET_SCORE_MARKER) {
            ReplyShape::GetScore {
                text: reply.replacen(GET_SCORE_MARKER, "", 1).trim().to_string(),
            }
        } else if reply.contains(VERIFY_KYC_MARKER) {
            ReplyShape::VerifyKyc {
                text: reply.replacen(VERIFY_KYC_MARKER, "", 1).trim().to_string(),
            }
        } else if reply.contains(OFFER_SANCTION_PREFIX) {
            classify_sanction(reply)
        } else {
            ReplyShape::Plain {
                text: reply.to_string(),
            }
        }
    }

    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            ReplyShape::GetScore { text }
            | ReplyShape::VerifyKyc { text }
            | ReplyShape::OfferSanction { text, .. }
            | ReplyShape::Plain { text } => text,
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self {
            ReplyShape::GetScore { .. } => Some(Action::GetScore),
            ReplyShape::VerifyKyc { .. } => Some(Action::VerifyKyc),
            ReplyShape::OfferSanction { offer, .. } => Some(Action::OfferSanction(offer.clone())),
            ReplyShape::Plain { .. } => None,
        }
    }
}

fn classify_sanction(reply: &str) -> ReplyShape {
    if let Some(caps) = OFFER_SANCTION_RE.captures(reply) {
        let payload = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if !payload.is_empty() {
            if let Some(offer) = LoanOffer::from_json(payload) {
                let text = reply.replacen(&caps[0], "", 1).trim().to_string();
                return ReplyShape::OfferSanction { text, offer };
            }
        }
    }
    tracing::warn!("Sanction marker without a usable payload");
    ReplyShape::Plain {
        text: strip_markers(reply),
    }
}

/// Remove every `[ACTION:...]` tag from a reply.
pub fn strip_markers(text: &str) -> String {
    ANY_MARKER_RE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_score_marker_removed_and_trimmed() {
        let shape = ReplyShape::classify("Okay, running that check now... [ACTION:GET_SCORE]");
        assert_eq!(
            shape,
            ReplyShape::GetScore {
                text: "Okay, running that check now...".to_string()
            }
        );
        assert_eq!(shape.action(), Some(Action::GetScore));
    }

    #[test]
    fn test_verify_kyc_marker() {
        let shape = ReplyShape::classify("  Great, verifying your (mock) KYC details...\n[ACTION:VERIFY_KYC]\n");
        assert_eq!(shape.text(), "Great, verifying your (mock) KYC details...");
        assert_eq!(shape.action(), Some(Action::VerifyKyc));
    }

    #[test]
    fn test_get_score_wins_over_kyc() {
        let shape = ReplyShape::classify("[ACTION:VERIFY_KYC] both [ACTION:GET_SCORE]");
        assert!(matches!(shape, ReplyShape::GetScore { .. }));
        assert_eq!(shape.text(), "[ACTION:VERIFY_KYC] both");
    }

    #[test]
    fn test_only_first_score_marker_is_removed() {
        let shape = ReplyShape::classify("a [ACTION:GET_SCORE] b [ACTION:GET_SCORE]");
        assert_eq!(shape.text(), "a  b [ACTION:GET_SCORE]");
    }

    #[test]
    fn test_offer_sanction_parses_payload() {
        let reply = r#"Generating that for you... [ACTION:OFFER_SANCTION|{"name": "Asha Rao", "amount": "500000", "interest_rate": "9.1"}]"#;
        let shape = ReplyShape::classify(reply);
        match shape {
            ReplyShape::OfferSanction { text, offer } => {
                assert_eq!(text, "Generating that for you...");
                assert_eq!(offer.name, "Asha Rao");
                assert_eq!(offer.amount, "500000");
                assert_eq!(offer.interest_rate, "9.1");
            }
            other => panic!("expected sanction offer, got {:?}", other),
        }
    }

    #[test]
    fn test_offer_sanction_accepts_numbers_and_defaults() {
        let offer = LoanOffer::from_json(r#"{"amount": 1000000, "interest_rate": 8.5}"#).unwrap();
        assert_eq!(offer.name, "Valued Customer");
        assert_eq!(offer.amount, "1000000");
        assert_eq!(offer.interest_rate, "8.5");
    }

    #[test]
    fn test_offer_sanction_without_payload_strips_markers() {
        let shape = ReplyShape::classify("Here you go [ACTION:OFFER_SANCTION] and [ACTION:OTHER]");
        assert_eq!(
            shape,
            ReplyShape::Plain {
                text: "Here you go  and ".to_string()
            }
        );
    }

    #[test]
    fn test_offer_sanction_with_bad_json_falls_back_to_plain() {
        let shape = ReplyShape::classify("Done [ACTION:OFFER_SANCTION|not json]");
        assert_eq!(shape.text(), "Done ");
        assert_eq!(shape.action(), None);
    }

    #[test]
    fn test_plain_reply_untouched() {
        let shape = ReplyShape::classify("  What is your monthly income?  ");
        assert_eq!(shape.text(), "  What is your monthly income?  ");
        assert_eq!(shape.action(), None);
    }

    #[test]
    fn test_strip_markers_removes_all() {
        assert_eq!(
            strip_markers("a [ACTION:GET_SCORE] b [ACTION:VERIFY_KYC] c"),
            "a  b  c"
        );
        assert_eq!(strip_markers("no markers"), "no markers");
    }
}
