//! Canned follow-up prompts.
//!
//! Offered under each reply. Most submit a fixed question; one may instead
//! point at an outside lawyer directory.

use serde::{Deserialize, Serialize};

pub const LAWYER_DIRECTORY_URL: &str = "http://korea-lawyer.com/new_html_file.php?file=new_member_ranking.html&file2=new_default_member_ranking.html";

/// What choosing a follow-up does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FollowUpAction {
    /// Submit this text as if the user had typed it.
    Prompt { text: String },
    /// Open this URL; nothing is submitted.
    Link { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub label: String,
    #[serde(flatten)]
    pub action: FollowUpAction,
}

impl FollowUp {
    pub fn prompt(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: FollowUpAction::Prompt { text: text.into() },
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: FollowUpAction::Link { url: url.into() },
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.action, FollowUpAction::Link { .. })
    }
}

pub fn default_follow_ups() -> Vec<FollowUp> {
    vec![
        FollowUp::prompt(
            "💡 빠져나갈 구멍은 없을까?",
            "이 상황에서 혐의를 피할 수 있는 전략이 있을까요?",
        ),
        FollowUp::prompt(
            "📚 비슷한 사건 더 알려줘",
            "비슷한 사건의 실제 판례를 3개 더 알려줘.",
        ),
        FollowUp::link("👩‍⚖️ 변호사 쉽게 모아보기", LAWYER_DIRECTORY_URL),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_exactly_one_link() {
        let follow_ups = default_follow_ups();
        assert_eq!(follow_ups.iter().filter(|f| f.is_link()).count(), 1);
        assert_eq!(follow_ups.len(), 3);
    }

    #[test]
    fn deserializes_flattened_config_entries() {
        let json = r#"[
            {"label": "Ask", "type": "prompt", "text": "What next?"},
            {"label": "Lawyers", "type": "link", "url": "https://example.com"}
        ]"#;
        let follow_ups: Vec<FollowUp> = serde_json::from_str(json).unwrap();

        assert_eq!(follow_ups[0], FollowUp::prompt("Ask", "What next?"));
        assert_eq!(follow_ups[1], FollowUp::link("Lawyers", "https://example.com"));
    }

    #[test]
    fn rejects_unknown_action_type() {
        let json = r#"{"label": "x", "type": "call", "number": "112"}"#;
        assert!(serde_json::from_str::<FollowUp>(json).is_err());
    }
}
