//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario, executed in order.
    pub steps: Vec<ScenarioStep>,
}

/// Operation fired by a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurstOp {
    Charge,
    Use,
    Read,
    /// Cycle charge, use, read by task index.
    Mixed,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Wait for a duration.
    Wait { millis: u64 },
    /// Single charge.
    Charge { user: i64, amount: i64 },
    /// Single use.
    Use { user: i64, amount: i64 },
    /// `tasks` concurrent operations per listed user, all started together.
    Burst {
        users: Vec<i64>,
        tasks: usize,
        op: BurstOp,
        amount: i64,
    },
    /// Random charges and uses over users `1..=users`.
    RandomLoad {
        users: i64,
        operations: usize,
        max_amount: i64,
    },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// User balance equals.
    BalanceEquals { user: i64, point: i64 },
    /// User history has exactly this many records.
    HistoryLength { user: i64, len: usize },
    /// Step took less than this long.
    ElapsedBelow { millis: u64 },
    /// Every user's balance equals the net of its history.
    Reconciled { users: i64 },
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "concurrent-charge" => Ok(Self::concurrent_charge()),
            "drain" => Ok(Self::drain()),
            "mixed" => Ok(Self::mixed()),
            "distinct-users" => Ok(Self::distinct_users()),
            "random" => Ok(Self::random()),
            path if path.ends_with(".json") => {
                let raw = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&raw)?)
            }
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Names of the built-in scenarios.
    pub fn builtin_names() -> &'static [&'static str] {
        &["concurrent-charge", "drain", "mixed", "distinct-users", "random"]
    }

    /// Ten concurrent charges on one user from zero.
    fn concurrent_charge() -> Self {
        Self {
            name: "concurrent-charge".to_string(),
            description: "10 concurrent charges of 100 on one user".to_string(),
            steps: vec![
                ScenarioStep::Burst {
                    users: vec![1],
                    tasks: 10,
                    op: BurstOp::Charge,
                    amount: 100,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { user: 1, point: 1000 },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::HistoryLength { user: 1, len: 10 },
                },
            ],
        }
    }

    /// More concurrent uses than the balance can cover.
    fn drain() -> Self {
        Self {
            name: "drain".to_string(),
            description: "15 concurrent uses of 100 against a balance of 1000".to_string(),
            steps: vec![
                ScenarioStep::Charge { user: 1, amount: 1000 },
                ScenarioStep::Burst {
                    users: vec![1],
                    tasks: 15,
                    op: BurstOp::Use,
                    amount: 100,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { user: 1, point: 0 },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::HistoryLength { user: 1, len: 11 },
                },
            ],
        }
    }

    /// Charges, uses and reads interleaved on one user.
    fn mixed() -> Self {
        Self {
            name: "mixed".to_string(),
            description: "15 mixed charge/use/read tasks on one user".to_string(),
            steps: vec![
                ScenarioStep::Charge { user: 1, amount: 1000 },
                ScenarioStep::Burst {
                    users: vec![1],
                    tasks: 15,
                    op: BurstOp::Mixed,
                    amount: 100,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { user: 1, point: 1000 },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::HistoryLength { user: 1, len: 11 },
                },
            ],
        }
    }

    /// Two users charged concurrently must not serialize.
    fn distinct_users() -> Self {
        Self {
            name: "distinct-users".to_string(),
            description: "Concurrent charges on two users overlap in time".to_string(),
            steps: vec![
                ScenarioStep::Burst {
                    users: vec![1, 2],
                    tasks: 1,
                    op: BurstOp::Charge,
                    amount: 10,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::ElapsedBelow { millis: 500 },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { user: 1, point: 10 },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { user: 2, point: 10 },
                },
            ],
        }
    }

    /// Seeded random load followed by reconciliation.
    fn random() -> Self {
        Self {
            name: "random".to_string(),
            description: "Random charges and uses over 20 users, then reconcile".to_string(),
            steps: vec![
                ScenarioStep::RandomLoad {
                    users: 20,
                    operations: 2000,
                    max_amount: 500,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::Reconciled { users: 20 },
                },
            ],
        }
    }
}
