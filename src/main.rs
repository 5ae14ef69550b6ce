// ==========================================
// 选举计票系统 - 命令行入口
// ==========================================
// 用法: election-tally <scenario.json>
// 输入: 分配方法 + 输入数据 + 按顺序应用的抽签选择
// 输出: 分配结果 JSON (stdout)，日志 (stderr)
// 环境变量: ELECTION_TALLY_DB_PATH, ELECTION_TALLY_LOG_FORMAT, RUST_LOG
// ==========================================

use anyhow::{bail, Context};
use election_tally::config::{ConfigManager, TallyConfig};
use election_tally::db::get_default_db_path;
use election_tally::domain::types::Role;
use election_tally::engine::double_proportional::DpInput;
use election_tally::engine::hagenbach_bischoff::HbInput;
use election_tally::engine::{
    ApportionmentOutcome, DoubleProportional, EngineResult, HagenbachBischoff, LotDecisionRegistry,
    Resolutions,
};
use election_tally::{logging, ActorContext};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
enum ScenarioInput {
    HagenbachBischoff { input: HbInput },
    DoubleProportional { input: DpInput },
}

/// 操作员抽签选择
#[derive(Debug, Deserialize)]
struct LotChoice {
    decision_id: String,
    chosen_entity_id: String,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(flatten)]
    apportionment: ScenarioInput,
    #[serde(default)]
    lot_choices: Vec<LotChoice>,
}

fn main() -> anyhow::Result<()> {
    // ELECTION_TALLY_LOG_FORMAT=json → 结构化日志
    match std::env::var("ELECTION_TALLY_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    let path: PathBuf = match std::env::args_os().nth(1) {
        Some(arg) => arg.into(),
        None => bail!("usage: election-tally <scenario.json>"),
    };

    tracing::info!(version = election_tally::VERSION, scenario = %path.display(), "election-tally starting");

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("invalid scenario {}", path.display()))?;

    let config = load_config();
    let outcome = run(&scenario, &config)?;

    if !outcome.is_complete() {
        let pending: Vec<&str> = outcome
            .lot_decisions()
            .iter()
            .filter(|d| d.is_pending())
            .map(|d| d.id.as_str())
            .collect();
        tracing::warn!(pending = ?pending, "apportionment incomplete, lot decisions pending");
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// 读取配置；数据库不可用时使用默认值
fn load_config() -> TallyConfig {
    let db_path = get_default_db_path();
    let loaded = ConfigManager::new(&db_path).and_then(|manager| manager.load_tally_config());
    match loaded {
        Ok(config) => {
            tracing::debug!(db_path = %db_path, ?config, "configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(db_path = %db_path, error = %e, "configuration unavailable, using defaults");
            TallyConfig::default()
        }
    }
}

/// 执行分配，按顺序应用抽签选择（每次裁决后重新分配）
fn run(scenario: &Scenario, config: &TallyConfig) -> anyhow::Result<ApportionmentOutcome> {
    let operator = ActorContext::new("cli", "local", [Role::ElectionAdmin], []);
    let mut registry = LotDecisionRegistry::new();
    let mut outcome = apportion(&scenario.apportionment, config, registry.resolutions())?;

    for choice in &scenario.lot_choices {
        registry
            .resolve(outcome.lot_decisions(), &choice.decision_id, &choice.chosen_entity_id, &operator)
            .with_context(|| format!("cannot apply lot choice {}", choice.decision_id))?;
        outcome = apportion(&scenario.apportionment, config, registry.resolutions())?;
    }
    Ok(outcome)
}

fn apportion(
    input: &ScenarioInput,
    config: &TallyConfig,
    resolutions: &Resolutions,
) -> EngineResult<ApportionmentOutcome> {
    match input {
        ScenarioInput::HagenbachBischoff { input } => {
            HagenbachBischoff::apportion(input, resolutions).map(ApportionmentOutcome::HagenbachBischoff)
        }
        ScenarioInput::DoubleProportional { input } => DoubleProportional::from_config(config)
            .apportion(input, resolutions)
            .map(ApportionmentOutcome::DoubleProportional),
    }
}
