use super::*;
use crate::testing::ScriptedHost;
use std::path::PathBuf;
use std::sync::Mutex;

const SCAN: &str = r#"workspace ok [{"node":"n2","fps":120,"clock":"c2","file":"f2"},{"node":"n1","fps":90,"clock":"c1","file":"f1"}] done"#;

/// Answers every gate the same way and records what was asked.
struct ScriptedPrompter {
    answer: bool,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<String> {
        self.asked.lock().expect("asked lock").clone()
    }
}

#[async_trait::async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        self.asked
            .lock()
            .expect("asked lock")
            .push(format!("{title}: {message}"));
        self.answer
    }
}

fn workbench(host: &Arc<ScriptedHost>, prompter: Arc<ScriptedPrompter>) -> Workbench {
    Workbench::new(
        host.bridge(),
        ModulePaths::new(PathBuf::from("/data/adb/modules/murongchaopin")),
        prompter,
    )
}

#[tokio::test]
async fn scan_sorts_nodes_and_selects_120_base() {
    let host = ScriptedHost::new();
    host.on("scan_rates", SCAN);
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    assert!(bench.scan().await.is_completed());
    let order: Vec<&str> = bench.nodes().iter().map(|node| node.node.as_str()).collect();
    assert_eq!(order, vec!["n1", "n2"]);
    assert_eq!(bench.base_node(), Some("n2"));
}

#[tokio::test]
async fn failed_scan_keeps_previous_table() {
    let host = ScriptedHost::new();
    host.on("scan_rates", SCAN);
    host.on("scan_rates", "Error: workspace missing");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    bench.scan().await;
    let outcome = bench.scan().await;
    match outcome {
        Outcome::Failed { message, detail } => {
            assert!(message.starts_with("scan failed"), "{message}");
            assert_eq!(detail, "Error: workspace missing");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(bench.nodes().len(), 2);
}

#[tokio::test]
async fn add_validates_before_calling_executor() {
    let host = ScriptedHost::new();
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    assert!(matches!(bench.add(None, "144").await, Outcome::Rejected { .. }));
    assert!(matches!(
        bench.add(Some("n2"), "fast").await,
        Outcome::Rejected { .. }
    ));
    assert!(matches!(
        bench.add(Some("n2"), "-5").await,
        Outcome::Rejected { .. }
    ));
    assert!(matches!(bench.add(Some("n2"), "0").await, Outcome::Rejected { .. }));
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn add_uses_selected_base_and_rescans() {
    let host = ScriptedHost::new();
    host.on("scan_rates", SCAN);
    host.on("add_rate", "Added node n3");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));
    bench.scan().await;

    let outcome = bench.add(None, " 144 ").await;
    assert!(outcome.is_completed(), "{outcome}");
    assert!(host
        .calls()
        .iter()
        .any(|call| call.ends_with("add_rate n2 144")));
    assert_eq!(host.count("scan_rates"), 2);
}

#[tokio::test]
async fn modify_add_success_remove_failure_is_partial() {
    let host = ScriptedHost::new();
    host.on("scan_rates", SCAN);
    host.on("add_rate", "Success: Added");
    host.on("remove_rate", "Error: busy");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));
    bench.scan().await;

    match bench.modify("n1", "100").await {
        Outcome::Partial { detail, .. } => assert_eq!(detail, "Error: busy"),
        other => panic!("expected partial outcome, got {other:?}"),
    }
    // Re-scan follows the successful add even though the remove failed.
    assert_eq!(host.count("scan_rates"), 2);
}

#[tokio::test]
async fn modify_outcomes_are_distinct() {
    let host = ScriptedHost::new();
    host.on("add_rate", "Success: Added");
    host.on("remove_rate", "Removed n1");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));
    assert!(bench.modify("n1", "100").await.is_completed());

    let host = ScriptedHost::new();
    host.on("add_rate", "Error: no space");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));
    assert!(matches!(
        bench.modify("n1", "100").await,
        Outcome::Failed { .. }
    ));
    assert_eq!(host.count("remove_rate"), 0);
    assert_eq!(host.count("scan_rates"), 0);
}

#[tokio::test]
async fn modify_to_same_rate_is_a_no_op() {
    let host = ScriptedHost::new();
    host.on("scan_rates", SCAN);
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));
    bench.scan().await;

    assert!(bench.modify("n2", "120").await.is_completed());
    assert!(matches!(bench.modify("n2", "").await, Outcome::Rejected { .. }));
    assert_eq!(host.count("add_rate"), 0);
}

#[tokio::test]
async fn declined_remove_makes_no_call() {
    let host = ScriptedHost::new();
    let prompter = ScriptedPrompter::answering(false);
    let mut bench = workbench(&host, prompter.clone());

    assert_eq!(bench.remove("n1").await, Outcome::Declined);
    assert!(!bench.remove("n1").await.is_error());
    assert_eq!(prompter.asked().len(), 2);
    assert!(host.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn every_destructive_action_is_gated() {
    let host = ScriptedHost::new();
    let prompter = ScriptedPrompter::answering(false);
    let mut bench = workbench(&host, prompter.clone());

    assert_eq!(bench.apply().await, Outcome::Declined);
    assert_eq!(bench.flash(None).await, Outcome::Declined);
    assert_eq!(bench.restore().await, Outcome::Declined);
    assert_eq!(bench.reextract().await, Outcome::Declined);
    assert_eq!(bench.auto_process().await, Outcome::Declined);
    assert_eq!(bench.uninstall().await, Outcome::Declined);
    assert_eq!(bench.toggle_adfr(AdfrMode::Disable).await, Outcome::Declined);
    assert_eq!(prompter.asked().len(), 7);
    assert!(host.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flash_with_custom_rate_warns_and_accepts_completion_marker() {
    let host = ScriptedHost::new();
    host.on("flash_dtbo", "操作完成");
    let prompter = ScriptedPrompter::answering(true);
    let mut bench = workbench(&host, prompter.clone());

    assert!(bench.flash(Some(" 165 ")).await.is_completed());
    assert!(prompter.asked()[0].contains("WARNING: custom refresh rate 165 Hz"));
    assert!(host.calls()[0].ends_with("flash_dtbo 165"));
}

#[tokio::test(start_paused = true)]
async fn reextract_rescans_only_on_success() {
    let host = ScriptedHost::new();
    host.on("init_workspace", "Error: dtbo partition not found");
    host.on("init_workspace", "Success");
    host.on("scan_rates", SCAN);
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    assert!(matches!(bench.reextract().await, Outcome::Failed { .. }));
    assert_eq!(host.count("scan_rates"), 0);
    assert!(bench.reextract().await.is_completed());
    assert_eq!(bench.nodes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn apply_reports_executor_text_on_failure() {
    let host = ScriptedHost::new();
    host.on("apply_changes", "repack failed: mkdtimg missing");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    assert_eq!(
        bench.apply().await,
        Outcome::failed("apply failed", "repack failed: mkdtimg missing")
    );
}

#[tokio::test]
async fn toggle_adfr_passes_mode_argument() {
    let host = ScriptedHost::new();
    host.on("toggle_adfr", "Success");
    let mut bench = workbench(&host, ScriptedPrompter::answering(true));

    assert!(bench.toggle_adfr(AdfrMode::Enable).await.is_completed());
    assert!(host.calls()[0].ends_with("toggle_adfr enable"));
}
