//! Command-line surface for the `investigate` binary.

use clap::Parser;

use crate::investigate::{InvestigationRequest, Investigator};
use crate::Result;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "investigate")]
#[command(about = "Investigate the connections of one entity and print them as JSON")]
pub struct InvestigateArgs {
    /// Entity id or name to start from
    pub query: String,

    /// Hops to expand (1-3); defaults to investigation.default_depth
    #[arg(short, long, allow_negative_numbers = true)]
    pub depth: Option<i64>,

    /// Only traverse this relationship type (repeatable)
    #[arg(short = 'r', long = "relationship-type")]
    pub relationship_types: Vec<String>,

    /// Print single-line JSON instead of the canonical pretty form
    #[arg(long)]
    pub compact: bool,
}

impl InvestigateArgs {
    pub fn to_request(&self) -> InvestigationRequest {
        InvestigationRequest {
            query: self.query.clone(),
            depth: self.depth,
            relationship_types: self.relationship_types.clone(),
        }
    }
}

/// Run one investigation and render it for stdout.
///
/// Not-found and partial results are `Ok`; callers map `Err` through
/// [`GraphscopeError::exit_code`](crate::GraphscopeError::exit_code).
pub async fn run(investigator: &Investigator, args: &InvestigateArgs) -> Result<String> {
    let result = investigator.investigate(&args.to_request()).await?;
    if args.compact {
        Ok(serde_json::to_string(&result)?)
    } else {
        result.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigate::InvestigationSettings;
    use crate::mcp::tools::handle_investigate;
    use crate::testutil::{sqlite_store, GraphFixture};
    use std::sync::Arc;

    fn fixture() -> GraphFixture {
        GraphFixture::new()
            .entity("A", "Acme Ltd", &["Company"])
            .entity("B", "Bob", &["Person"])
            .entity("C", "Checking 001", &["Account"])
            .attribute("A", "country", serde_json::json!("NL"))
            .edge("A", "OWNED_BY", "B")
            .edge("B", "CONTACTED_VIA", "C")
            .edge("C", "OWNED_BY", "A")
    }

    fn without_duration(json: &str) -> String {
        json.lines()
            .filter(|line| !line.contains("\"queryDurationMs\""))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_args() {
        let args = InvestigateArgs::try_parse_from([
            "investigate",
            "Acme Ltd",
            "-d",
            "2",
            "-r",
            "OWNED_BY",
            "--relationship-type",
            "CONTACTED_VIA",
        ])
        .unwrap();
        assert_eq!(args.query, "Acme Ltd");
        assert_eq!(args.depth, Some(2));
        assert_eq!(args.relationship_types, vec!["OWNED_BY", "CONTACTED_VIA"]);
        assert!(!args.compact);

        let negative = InvestigateArgs::try_parse_from(["investigate", "A", "--depth", "-1"]).unwrap();
        assert_eq!(negative.depth, Some(-1));
    }

    #[tokio::test]
    async fn test_cli_and_tool_output_match() {
        let (store, _temp) = sqlite_store(&fixture()).await;
        let investigator =
            Investigator::new(Arc::new(store), InvestigationSettings::default()).unwrap();

        let args = InvestigateArgs::try_parse_from(["investigate", "A", "-d", "3"]).unwrap();
        let cli_output = run(&investigator, &args).await.unwrap();

        let tool_output = handle_investigate(
            &investigator,
            &serde_json::json!({"query": "A", "depth": 3, "relationshipTypes": []}),
        )
        .await
        .unwrap();
        assert_eq!(tool_output.is_error, None);

        assert_eq!(
            without_duration(&cli_output),
            without_duration(&tool_output.content[0].text)
        );
    }

    #[tokio::test]
    async fn test_exit_codes() {
        let store = Arc::new(fixture().memory_store());
        let investigator =
            Investigator::new(store.clone(), InvestigationSettings::default()).unwrap();

        let not_found = InvestigateArgs::try_parse_from(["investigate", "Nobody"]).unwrap();
        let output = run(&investigator, &not_found).await.unwrap();
        assert!(output.contains("\"entity_not_found\""));

        let bad_depth = InvestigateArgs::try_parse_from(["investigate", "A", "-d", "9"]).unwrap();
        assert_eq!(run(&investigator, &bad_depth).await.unwrap_err().exit_code(), 2);

        store.set_unavailable(true);
        let ok_args = InvestigateArgs::try_parse_from(["investigate", "A"]).unwrap();
        assert_eq!(run(&investigator, &ok_args).await.unwrap_err().exit_code(), 3);
    }

    #[tokio::test]
    async fn test_compact_output_is_single_line() {
        let store = Arc::new(fixture().memory_store());
        let investigator = Investigator::new(store, InvestigationSettings::default()).unwrap();
        let args = InvestigateArgs::try_parse_from(["investigate", "A", "--compact"]).unwrap();

        let output = run(&investigator, &args).await.unwrap();
        assert!(!output.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["root"]["attributes"]["country"], "NL");
    }
}
