use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::{EntityKind, OutputFormat};

pub async fn handle(
    client: &ApiClient,
    entity: EntityKind,
    include_orphans: bool,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let path = format!("{}/tree?include_orphans={}", entity.path_prefix(), include_orphans);
    let nodes = client.get(&path).await?;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&nodes)?),
        OutputFormat::Text => {
            let outline = render_outline(&nodes);
            if outline.is_empty() {
                println!("(empty tree)");
            } else {
                print!("{}", outline);
            }
        }
    }
    Ok(())
}

/// Indented outline of a MenuNode forest, one node per line
pub fn render_outline(nodes: &Value) -> String {
    let mut out = String::new();
    write_level(nodes, 0, &mut out);
    out
}

fn write_level(nodes: &Value, depth: usize, out: &mut String) {
    let Some(nodes) = nodes.as_array() else {
        return;
    };

    for node in nodes {
        let name = node.get("name").and_then(Value::as_str).unwrap_or("?");
        let id = node.get("id").and_then(Value::as_i64).unwrap_or_default();
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("- {} (#{})", name, id));
        if let Some(category) = node.get("category").and_then(Value::as_str) {
            out.push_str(&format!(" [{}]", category));
        }
        out.push('\n');

        if let Some(children) = node.get("children") {
            write_level(children, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_outline() {
        let nodes = json!([
            { "id": 1, "name": "HR", "category": "office", "sort_order": 0, "children": [
                { "id": 3, "name": "Leave", "category": "office", "sort_order": 0, "children": [] },
                { "id": 2, "name": "Payroll", "category": "office", "sort_order": 1, "children": [] }
            ]},
            { "id": 4, "name": "MES", "sort_order": 1, "children": [] }
        ]);

        assert_eq!(
            render_outline(&nodes),
            "- HR (#1) [office]\n  - Leave (#3) [office]\n  - Payroll (#2) [office]\n- MES (#4)\n"
        );
    }

    #[test]
    fn empty_forest_renders_nothing() {
        assert_eq!(render_outline(&json!([])), "");
        assert_eq!(render_outline(&Value::Null), "");
    }
}
