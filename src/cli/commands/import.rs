use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::path::Path;

use crate::cli::client::ApiClient;
use crate::cli::utils::output_success;
use crate::cli::{EntityKind, OutputFormat};

pub async fn handle(
    client: &ApiClient,
    entity: EntityKind,
    file: &Path,
    parent_id: Option<i32>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let is_yaml = matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let body = parse_document(&text, is_yaml)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let path = match parent_id {
        Some(parent) => format!("{}/create?parent_id={}", entity.path_prefix(), parent),
        None => format!("{}/create", entity.path_prefix()),
    };
    let created = client.post(&path, &body).await?;
    let count = count_nodes(&created);

    output_success(
        &output_format,
        &format!("Imported {} nodes from {}", count, file.display()),
        Some(json!({ "created": count, "nodes": created })),
    )
}

/// Parse an import document into a single node object or an array of them
pub fn parse_document(text: &str, is_yaml: bool) -> anyhow::Result<Value> {
    let value: Value = if is_yaml {
        serde_yaml::from_str(text)?
    } else {
        serde_json::from_str(text)?
    };

    match &value {
        Value::Object(_) => Ok(value),
        Value::Array(items) if items.is_empty() => bail!("document contains no nodes"),
        Value::Array(_) => Ok(value),
        _ => bail!("document must be a node or a list of nodes"),
    }
}

/// Number of nodes in a created forest, children included
pub fn count_nodes(nodes: &Value) -> usize {
    nodes
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|n| 1 + n.get("children").map(count_nodes).unwrap_or(0))
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_document_parses_to_nested_nodes() {
        let text = r#"
- name: HR
  desc: Human resources
  category: office
  href: /hr
  children:
    - name: Leave
      desc: Leave requests
      category: office
      href: /hr/leave
"#;
        let value = parse_document(text, true).unwrap();
        assert_eq!(value[0]["children"][0]["name"], "Leave");
    }

    #[test]
    fn scalar_and_empty_documents_are_rejected() {
        assert!(parse_document("42", false).is_err());
        assert!(parse_document("[]", false).is_err());
        assert!(parse_document("{\"name\": \"x\"}", false).is_ok());
    }

    #[test]
    fn counts_created_nodes_recursively() {
        let created = json!([
            { "id": 10, "children": [{ "id": 11, "children": [] }, { "id": 12, "children": [] }] },
            { "id": 13, "children": [] }
        ]);
        assert_eq!(count_nodes(&created), 4);
    }
}
