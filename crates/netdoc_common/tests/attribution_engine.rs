//! Attribution engine scenarios against a fake host and scripted metrics

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{active_proxy, fast_config, FakeHost, ProxyBoundSource, ScriptedSource};
use netdoc_common::actions::{candidates, HostExecutor};
use netdoc_common::attribution::{
    ActionTrial, AttributionEngine, EffectClass, NoopObserver, PrimaryCause, TrialObserver,
};
use netdoc_common::host::Capability;
use netdoc_common::orchestrator::Orchestrator;
use netdoc_common::{ActionId, NetDocError};

#[derive(Default)]
struct CountingObserver {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl TrialObserver for CountingObserver {
    fn trial_started(&self, _index: usize, _total: usize, _action: ActionId) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn trial_finished(&self, _index: usize, _total: usize, _trial: &ActionTrial) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_ranks_trials_and_names_primary_cause() {
    let host = FakeHost::healthy().shared();
    let executor = HostExecutor::new(host.clone());
    // baseline/post pairs, one per candidate in registry order
    let source = ScriptedSource::new(&[
        1000.0, 960.0, // flush dns: 4%
        960.0, 950.0, // clear arp: ~1%
        950.0, 900.0, // clear netbios: ~5.3%
        900.0, 900.0, // refresh netbios: 0%
        900.0, 500.0, // disable proxy: ~44%
        500.0, 500.0, // reset winhttp: 0%
    ]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let report = engine.run(&candidates(), &NoopObserver).await.unwrap();

    assert_eq!(report.trials.len(), 6);
    assert_eq!(source.remaining(), 0, "every trial takes exactly two samples");
    assert_eq!(report.primary_cause, PrimaryCause::Action(ActionId::DisableProxy));
    assert_eq!(report.trials[0].action_id, ActionId::DisableProxy);
    assert_eq!(report.trials[0].effect_class, EffectClass::Effective);
    assert_eq!(report.trials[1].action_id, ActionId::ClearNetbiosCache);
    assert_eq!(report.trials[1].effect_class, EffectClass::Slight);

    let pcts: Vec<f64> = report.trials.iter().filter_map(|t| t.improvement_pct).collect();
    assert!(
        pcts.windows(2).all(|w| w[0] >= w[1]),
        "trials must be sorted by improvement descending: {:?}",
        pcts
    );
}

#[tokio::test]
async fn test_failed_apply_is_recorded_and_run_continues() {
    let host = FakeHost::healthy()
        .with(|s| {
            s.failing.insert(Capability::FlushDnsCache);
        })
        .shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[1000.0, 1000.0, 700.0]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let report = engine
        .run(&[ActionId::FlushDnsCache, ActionId::ClearArpCache], &NoopObserver)
        .await
        .unwrap();

    assert_eq!(source.remaining(), 0, "failed apply skips the post sample");
    assert_eq!(report.trials[0].action_id, ActionId::ClearArpCache);
    assert_eq!(report.trials[0].improvement_pct, Some(30.0));

    let failed = &report.trials[1];
    assert_eq!(failed.action_id, ActionId::FlushDnsCache);
    assert!(failed.apply_error.is_some());
    assert_eq!(failed.effect_class, EffectClass::None);
    assert_eq!(failed.post, failed.baseline);
    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.primary_cause, PrimaryCause::Action(ActionId::ClearArpCache));
}

#[tokio::test]
async fn test_arp_fallback_step_used() {
    let host = FakeHost::healthy()
        .with(|s| {
            s.failing.insert(Capability::ClearNeighbors);
        })
        .shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[800.0, 790.0]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let report = engine.run(&[ActionId::ClearArpCache], &NoopObserver).await.unwrap();

    assert!(report.trials[0].apply_error.is_none());
    assert_eq!(
        host.invoked(),
        vec![Capability::ClearNeighbors, Capability::ClearNeighborsFallback]
    );
}

#[tokio::test]
async fn test_not_elevated_aborts_before_any_action() {
    let host = FakeHost::healthy().with(|s| s.elevated = false).shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[1000.0, 500.0]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let err = engine.run(&candidates(), &NoopObserver).await.unwrap_err();

    assert!(matches!(err, NetDocError::NotElevated));
    assert!(host.invoked().is_empty());
    assert_eq!(source.remaining(), 2, "no samples taken");
}

#[tokio::test]
async fn test_sentinel_baseline_is_indeterminate() {
    let host = FakeHost::healthy().shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[-1.0, 400.0, 1000.0, 990.0]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let report = engine
        .run(&[ActionId::FlushDnsCache, ActionId::ClearNetbiosCache], &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.trials[0].action_id, ActionId::ClearNetbiosCache);
    let indeterminate = &report.trials[1];
    assert_eq!(indeterminate.action_id, ActionId::FlushDnsCache);
    assert_eq!(indeterminate.improvement_pct, None);
    assert!(!indeterminate.is_ranked());
    assert_eq!(report.primary_cause, PrimaryCause::Inconclusive);
    assert_eq!(report.primary_cause.to_string(), "inconclusive");
}

#[tokio::test]
async fn test_observer_sees_every_trial() {
    let host = FakeHost::healthy().shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[100.0; 12]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);
    let observer = CountingObserver::default();

    let report = engine.run(&candidates(), &observer).await.unwrap();

    assert_eq!(observer.started.load(Ordering::SeqCst), 6);
    assert_eq!(observer.finished.load(Ordering::SeqCst), 6);
    assert_eq!(report.primary_cause, PrimaryCause::Inconclusive);
}

#[tokio::test]
async fn test_proxy_misconfiguration_is_isolated() {
    let host = FakeHost::healthy()
        .with(|s| {
            s.proxy = active_proxy();
            s.winhttp_proxy = Some("10.0.0.1:3128".to_string());
        })
        .shared();
    let executor = HostExecutor::new(host.clone());
    let source = ProxyBoundSource {
        host: host.clone(),
        with_proxy_ms: 2400.0,
        direct_ms: 600.0,
    };
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);
    let orchestrator = Orchestrator::new(&executor);

    let outcome = orchestrator
        .guided(&engine, &candidates(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(
        outcome.report.primary_cause,
        PrimaryCause::Action(ActionId::DisableProxy)
    );
    let primary = outcome.report.primary_trial().unwrap();
    assert_eq!(primary.improvement_pct, Some(75.0));
    assert!(!outcome.fell_back_to_full);
    assert_eq!(outcome.tally.summary(), "success 1 / total 1");
    assert_eq!(outcome.tally.results[0].verified, Some(true));
    assert!(!host.proxy_enabled());
}

#[tokio::test]
async fn test_averaged_trial_samples() {
    let host = FakeHost::healthy().shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[1000.0, 1200.0, 600.0, 800.0]);
    let mut config = fast_config();
    config.engine.trial_samples = 2;
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let report = engine.run(&[ActionId::FlushDnsCache], &NoopObserver).await.unwrap();

    let trial = &report.trials[0];
    assert_eq!(trial.baseline.http_response_ms(), 1100.0);
    assert_eq!(trial.post.http_response_ms(), 700.0);
    assert_eq!(source.remaining(), 0);
    assert_eq!(trial.effect_class, EffectClass::Effective);
}

#[tokio::test]
async fn test_run_ids_are_unique() {
    let host = FakeHost::healthy().shared();
    let executor = HostExecutor::new(host.clone());
    let source = ScriptedSource::new(&[]);
    let config = fast_config();
    let engine = AttributionEngine::new(&source, &executor, &config.engine);

    let a = engine.run(&[], &NoopObserver).await.unwrap();
    let b = engine.run(&[], &NoopObserver).await.unwrap();
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.primary_cause, PrimaryCause::Inconclusive);
}
