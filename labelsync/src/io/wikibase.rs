//! Item repository side: sitelink lookup and label/alias writes.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::types::{ItemSnapshot, LabelState};
use crate::io::mediawiki::ApiClient;

pub trait ItemStore {
    /// Item whose sitelink for the configured wiki points at `title`.
    fn linked_item(&self, title: &str) -> Result<Option<ItemSnapshot>>;
    fn set_label(&self, item_id: &str, label: &str, summary: &str) -> Result<()>;
    /// Append `alias` to the item's aliases in the configured language.
    fn add_alias(&self, item_id: &str, alias: &str, summary: &str) -> Result<()>;
}

/// Wikibase repository reached through its action API.
pub struct Wikibase {
    client: ApiClient,
    site_id: String,
    lang: String,
}

impl Wikibase {
    pub fn new(client: ApiClient, site_id: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            client,
            site_id: site_id.into(),
            lang: lang.into(),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        self.client
            .login(username, password)
            .context("log in to item repository")
    }
}

impl ItemStore for Wikibase {
    #[instrument(skip(self), fields(site = %self.site_id))]
    fn linked_item(&self, title: &str) -> Result<Option<ItemSnapshot>> {
        let body = self
            .client
            .get(&[
                ("action", "wbgetentities"),
                ("sites", self.site_id.as_str()),
                ("titles", title),
                ("props", "labels|aliases"),
                ("languages", self.lang.as_str()),
            ])
            .with_context(|| format!("look up item for {}:{title}", self.site_id))?;
        parse_entities(&body, &self.lang)
    }

    #[instrument(skip(self, summary))]
    fn set_label(&self, item_id: &str, label: &str, summary: &str) -> Result<()> {
        self.client
            .post_write(&[
                ("action", "wbsetlabel"),
                ("id", item_id),
                ("language", self.lang.as_str()),
                ("value", label),
                ("summary", summary),
                ("bot", "1"),
            ])
            .with_context(|| format!("set label of {item_id}"))?;
        info!(item_id, label, "label written");
        Ok(())
    }

    #[instrument(skip(self, summary))]
    fn add_alias(&self, item_id: &str, alias: &str, summary: &str) -> Result<()> {
        self.client
            .post_write(&[
                ("action", "wbsetaliases"),
                ("id", item_id),
                ("language", self.lang.as_str()),
                ("add", alias),
                ("summary", summary),
                ("bot", "1"),
            ])
            .with_context(|| format!("add alias to {item_id}"))?;
        info!(item_id, alias, "alias written");
        Ok(())
    }
}

/// Parse a `wbgetentities` response holding at most one entity.
///
/// Unknown titles come back as an entity keyed `-1` flagged `missing`.
pub fn parse_entities(body: &Value, lang: &str) -> Result<Option<ItemSnapshot>> {
    let entities = body
        .get("entities")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("wbgetentities response has no entities"))?;
    let Some(entity) = entities
        .values()
        .find(|entity| entity.get("missing").is_none() && entity.get("id").is_some())
    else {
        return Ok(None);
    };
    let id = entity
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("entity without string id"))?
        .to_string();
    let label = entity
        .pointer(&format!("/labels/{lang}/value"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let aliases = entity
        .pointer(&format!("/aliases/{lang}"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|alias| alias.get("value").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    Ok(Some(ItemSnapshot {
        id,
        state: LabelState { label, aliases },
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn linked_item_with_label_and_aliases() {
        let body = json!({"entities": {"Q585": {
            "type": "item", "id": "Q585",
            "labels": {"nb": {"language": "nb", "value": "Oslo"}},
            "aliases": {"nb": [
                {"language": "nb", "value": "Kristiania"},
                {"language": "nb", "value": "Christiania"}
            ]}
        }}, "success": 1});
        let item = parse_entities(&body, "nb").expect("parse").expect("item");
        assert_eq!(item.id, "Q585");
        assert_eq!(item.label(), Some("Oslo"));
        assert_eq!(item.state.aliases, vec!["Kristiania", "Christiania"]);
    }

    #[test]
    fn item_without_label_in_language() {
        let body = json!({"entities": {"Q585": {
            "type": "item", "id": "Q585",
            "labels": {}, "aliases": {}
        }}});
        let item = parse_entities(&body, "nn").expect("parse").expect("item");
        assert_eq!(item.label(), None);
        assert!(item.state.aliases.is_empty());
    }

    #[test]
    fn unlinked_title_is_none() {
        let body = json!({"entities": {"-1": {
            "site": "nowiki", "title": "Kristiania", "missing": true
        }}, "success": 1});
        assert_eq!(parse_entities(&body, "nb").expect("parse"), None);
    }
}
