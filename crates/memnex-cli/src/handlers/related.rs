use memnex_runtime::{Error, Memnex};
use memnex_store::queries::{link, session};
use memnex_types::NodeType;

use crate::args::NodeTypeArg;
use crate::format::{Formatter, short_id};
use crate::handlers::show::resolve_session_id;

pub fn handle(
    workspace: &Memnex,
    id: &str,
    limit: usize,
    hops: u32,
    node_type: NodeTypeArg,
    formatter: Formatter,
) -> Result<i32, Error> {
    let node_type: NodeType = node_type.into();
    let source_id = if node_type == NodeType::Session {
        resolve_session_id(workspace, id)?
    } else {
        id.to_string()
    };

    let conn = workspace.store().conn();
    let related = link::related_sessions(conn, node_type, &source_id, hops, limit)?;

    if formatter.is_json() {
        let value = serde_json::json!({
            "source": {"type": node_type.as_str(), "id": source_id},
            "related": related.iter().map(|r| serde_json::json!({
                "session_id": r.session_id,
                "weight": r.weight,
                "hop": r.hop,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    if related.is_empty() {
        if !formatter.is_quiet() {
            println!("Nothing related to {} within {} hops", source_id, hops);
        }
        return Ok(0);
    }

    let detailed = matches!(formatter, Formatter::Detailed | Formatter::Verbose);
    for item in &related {
        if formatter.is_quiet() {
            println!("{}", item.session_id);
            continue;
        }

        let label = match session::get(conn, &item.session_id)? {
            Some(record) => format!(
                "{}  {}",
                short_id(&item.session_id),
                record.summary.unwrap_or(record.project_name)
            ),
            None => short_id(&item.session_id),
        };

        if detailed {
            println!(
                "{:.2}  hop {}  {}  ({})",
                item.weight, item.hop, label, item.session_id
            );
        } else {
            println!("{:.2}  hop {}  {}", item.weight, item.hop, label);
        }
    }

    Ok(0)
}
