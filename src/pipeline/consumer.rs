// src/pipeline/consumer.rs

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::{
    process::payload::TrafficPayload,
    sales::SalesApi,
    workitems::{ExceptionType, WorkItem, WorkItemQueue},
};

pub const INVALID_TRAFFIC_DATA: &str = "INVALID_TRAFFIC_DATA";
pub const TRAFFIC_DATA_POST_FAILED: &str = "TRAFFIC_DATA_POST_FAILED";

/// Terminal result decided for one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Failed {
        exception: ExceptionType,
        code: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub done: usize,
    pub business_failed: usize,
    pub application_failed: usize,
}

impl ConsumeSummary {
    pub fn total(&self) -> usize {
        self.done + self.business_failed + self.application_failed
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Done => self.done += 1,
            Outcome::Failed {
                exception: ExceptionType::Business,
                ..
            } => self.business_failed += 1,
            Outcome::Failed {
                exception: ExceptionType::Application,
                ..
            } => self.application_failed += 1,
        }
    }
}

/// A country code must be exactly three characters. Only the length is checked.
pub fn validate_traffic_data(data: &TrafficPayload) -> bool {
    data.country.chars().count() == 3
}

/// Decide the outcome of one item. Never fails: every problem becomes a
/// `Failed` outcome.
pub async fn process_item<A: SalesApi + ?Sized>(api: &A, item: &WorkItem) -> Outcome {
    let invalid = || Outcome::Failed {
        exception: ExceptionType::Business,
        code: INVALID_TRAFFIC_DATA,
        message: item.payload.to_string(),
    };

    let data = match TrafficPayload::from_work_item_payload(&item.payload) {
        Ok(d) => d,
        Err(reason) => {
            warn!(id = %item.id, %reason, "undecodable traffic data");
            return invalid();
        }
    };
    if !validate_traffic_data(&data) {
        warn!(id = %item.id, country = %data.country, "invalid country code");
        return invalid();
    }

    match api.post_traffic(&data).await {
        Ok(resp) if resp.is_success() => Outcome::Done,
        Ok(resp) => {
            warn!(id = %item.id, status = resp.status, "sales API rejected traffic data");
            Outcome::Failed {
                exception: ExceptionType::Application,
                code: TRAFFIC_DATA_POST_FAILED,
                message: resp.failure_message(),
            }
        }
        Err(e) => {
            warn!(id = %item.id, error = %format!("{:#}", e), "sales API unreachable");
            Outcome::Failed {
                exception: ExceptionType::Application,
                code: TRAFFIC_DATA_POST_FAILED,
                message: format!("{:#}", e),
            }
        }
    }
}

pub async fn apply_outcome<Q: WorkItemQueue>(queue: &mut Q, id: &str, outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Done => queue.mark_done(id).await,
        Outcome::Failed {
            exception,
            code,
            message,
        } => queue.mark_failed(id, *exception, code, message).await,
    }
}

/// Drain the queue in order, one item at a time. Only queue errors abort.
#[instrument(level = "info", skip_all)]
pub async fn run_consumer<A: SalesApi + ?Sized, Q: WorkItemQueue>(
    api: &A,
    queue: &mut Q,
) -> Result<ConsumeSummary> {
    info!("Consuming traffic data...");
    let mut summary = ConsumeSummary::default();

    while let Some(item) = queue.next_pending().await? {
        let outcome = process_item(api, &item).await;
        apply_outcome(queue, &item.id, &outcome).await?;
        match &outcome {
            Outcome::Done => info!(id = %item.id, "work item done"),
            Outcome::Failed {
                exception, code, ..
            } => info!(id = %item.id, exception = exception.as_str(), code, "work item failed"),
        }
        summary.record(&outcome);
    }

    info!(
        done = summary.done,
        business_failed = summary.business_failed,
        application_failed = summary.application_failed,
        "consumer finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sales::SalesResponse,
        test_support::init_logging,
        workitems::{MemoryQueue, WorkItemState},
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::{collections::VecDeque, sync::Mutex};

    /// Answers from a script and records what it was sent.
    #[derive(Default)]
    struct ScriptedApi {
        answers: Mutex<VecDeque<Result<SalesResponse>>>,
        sent: Mutex<Vec<TrafficPayload>>,
    }

    impl ScriptedApi {
        fn new(answers: Vec<Result<SalesResponse>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<TrafficPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SalesApi for ScriptedApi {
        async fn post_traffic(&self, payload: &TrafficPayload) -> Result<SalesResponse> {
            self.sent.lock().unwrap().push(payload.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected POST")
        }
    }

    fn ok() -> Result<SalesResponse> {
        Ok(SalesResponse {
            status: 200,
            message: None,
        })
    }

    fn item(payload: serde_json::Value) -> WorkItem {
        MemoryQueue::with_payloads([payload]).items()[0].clone()
    }

    #[test]
    fn test_validate_country_length_only() {
        let p = |c: &str| TrafficPayload {
            country: c.into(),
            ..Default::default()
        };
        assert!(validate_traffic_data(&p("USA")));
        assert!(validate_traffic_data(&p("123")));
        assert!(validate_traffic_data(&p("a b")));
        assert!(validate_traffic_data(&p("ÅÄÖ")));
        assert!(!validate_traffic_data(&p("US")));
        assert!(!validate_traffic_data(&p("USAA")));
        assert!(!validate_traffic_data(&p("")));
        // same answer every time
        assert_eq!(validate_traffic_data(&p("FRA")), validate_traffic_data(&p("FRA")));
    }

    #[tokio::test]
    async fn test_invalid_country_is_business_failure() {
        let api = ScriptedApi::new(vec![]);
        let payload = json!({"traffic_data": {"country": "US", "year": 2015, "rate": 2.1}});
        let outcome = process_item(&api, &item(payload.clone())).await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                exception: ExceptionType::Business,
                code: INVALID_TRAFFIC_DATA,
                message: payload.to_string(),
            }
        );
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_traffic_data_is_business_failure() {
        let api = ScriptedApi::new(vec![]);
        let outcome = process_item(&api, &item(json!({"something": "else"}))).await;
        assert!(matches!(
            outcome,
            Outcome::Failed {
                exception: ExceptionType::Business,
                code: INVALID_TRAFFIC_DATA,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_valid_item_posted_and_done() {
        let api = ScriptedApi::new(vec![ok()]);
        let outcome = process_item(
            &api,
            &item(json!({"traffic_data": {"country": "USA", "year": 2015, "rate": 2.1}})),
        )
        .await;

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(
            api.sent(),
            vec![TrafficPayload::new("USA", 2015, 2.1)]
        );
    }

    #[tokio::test]
    async fn test_unusual_year_and_rate_are_posted_unchanged() {
        let api = ScriptedApi::new(vec![ok(), ok(), ok()]);
        let payloads = [
            json!({"traffic_data": {"country": "USA", "year": "2015-2019"}}),
            json!({"traffic_data": {"country": "FRA", "year": 2015.5, "rate": 3.0}}),
            json!({"traffic_data": {"country": "DEU", "year": 2018, "rate": true}}),
        ];
        for payload in &payloads {
            assert_eq!(process_item(&api, &item(payload.clone())).await, Outcome::Done);
        }

        assert_eq!(
            api.sent(),
            vec![
                TrafficPayload::new("USA", "2015-2019", ""),
                TrafficPayload::new("FRA", 2015.5, 3.0),
                TrafficPayload::new("DEU", 2018, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_string_country_is_business_failure() {
        let api = ScriptedApi::new(vec![]);
        let outcome = process_item(&api, &item(json!({"traffic_data": {"country": 840}}))).await;
        assert!(matches!(
            outcome,
            Outcome::Failed {
                exception: ExceptionType::Business,
                code: INVALID_TRAFFIC_DATA,
                ..
            }
        ));
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_post_is_application_failure() {
        let api = ScriptedApi::new(vec![Ok(SalesResponse {
            status: 400,
            message: Some("bad request".into()),
        })]);
        let outcome = process_item(&api, &item(json!({"traffic_data": {"country": "USA"}}))).await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                exception: ExceptionType::Application,
                code: TRAFFIC_DATA_POST_FAILED,
                message: "bad request".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_application_failure() {
        let api = ScriptedApi::new(vec![Err(anyhow!("connection reset"))]);
        let outcome = process_item(&api, &item(json!({"traffic_data": {"country": "USA"}}))).await;

        match outcome {
            Outcome::Failed {
                exception,
                code,
                message,
            } => {
                assert_eq!(exception, ExceptionType::Application);
                assert_eq!(code, TRAFFIC_DATA_POST_FAILED);
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_consumer_drains_in_order() -> Result<()> {
        init_logging();
        let mut queue = MemoryQueue::with_payloads([
            json!({"traffic_data": {"country": "USA", "year": 2015, "rate": 2.1}}),
            json!({"traffic_data": {"country": "US", "year": 2011, "rate": 0.5}}),
            json!({"traffic_data": {"country": "FRA", "year": 2020, "rate": 3.0}}),
            json!({"traffic_data": {"country": "DEU", "year": 2018, "rate": 1.0}}),
        ]);
        let api = ScriptedApi::new(vec![
            ok(),
            Ok(SalesResponse {
                status: 400,
                message: Some("bad request".into()),
            }),
            Err(anyhow!("timed out")),
        ]);

        let summary = run_consumer(&api, &mut queue).await?;

        assert_eq!(
            summary,
            ConsumeSummary {
                done: 1,
                business_failed: 1,
                application_failed: 2,
            }
        );
        assert_eq!(summary.total(), 4);

        let sent: Vec<String> = api.sent().into_iter().map(|p| p.country).collect();
        assert_eq!(sent, vec!["USA", "FRA", "DEU"]);

        let items = queue.items();
        assert_eq!(items[0].state, WorkItemState::Done);
        assert!(matches!(
            &items[1].state,
            WorkItemState::Failed { exception: ExceptionType::Business, code, .. } if code == INVALID_TRAFFIC_DATA
        ));
        assert_eq!(
            items[2].state,
            WorkItemState::Failed {
                exception: ExceptionType::Application,
                code: TRAFFIC_DATA_POST_FAILED.into(),
                message: "bad request".into(),
            }
        );
        assert!(matches!(
            &items[3].state,
            WorkItemState::Failed { exception: ExceptionType::Application, .. }
        ));

        // a second pass over the same handle finds nothing left
        let again = run_consumer(&api, &mut queue).await?;
        assert_eq!(again.total(), 0);
        Ok(())
    }
}
