//! End-to-end search jobs over scripted sites and the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use recetario::models::{JobState, SearchRequest, SiteState, Strategy};
use recetario::repository::{MemoryRecipeStore, RecipeStore};
use recetario::scrapers::SiteAdapter;
use recetario::services::{canonical_url, SearchError};

use common::{assert_balanced, finish, seed, service, test_config, Gauge, Page, ScriptedSite};

fn request(cap: usize) -> SearchRequest {
    SearchRequest {
        keyword: Some("tortilla".to_string()),
        result_cap: cap,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_two_sites_with_duplicate_and_empty_page() {
    let site_a = Arc::new(ScriptedSite::new(
        "Site A",
        "a.test",
        &[Page::Valid, Page::Valid, Page::Valid, Page::Valid, Page::Empty],
    ));
    let site_b = Arc::new(ScriptedSite::new("Site B", "b.test", &[Page::Valid, Page::Valid]));
    let store = Arc::new(MemoryRecipeStore::new());
    // fourth recipe of A was saved by an earlier run
    seed(&store, &site_a.url(3)).await;

    let service = service(vec![site_a.clone(), site_b.clone()], store.clone(), test_config());
    let started = service.start_search(request(10)).unwrap();
    assert_eq!(started.strategy, Strategy::Parallel);

    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.total_found, 7);
    assert_eq!(result.total_new, 5);
    assert_eq!(result.total_duplicate, 1);
    assert_eq!(result.total_discarded_empty, 1);
    assert_eq!(result.total_discarded_language, 0);
    assert_eq!(result.total_errors, 0);
    assert_balanced(&result);

    let a = result.site("Site A").unwrap();
    assert_eq!(a.state, SiteState::Completed);
    assert_eq!((a.counters.found, a.counters.new, a.counters.duplicate), (5, 3, 1));
    let b = result.site("Site B").unwrap();
    assert_eq!(b.state, SiteState::Completed);
    assert_eq!((b.counters.found, b.counters.new), (2, 2));

    assert_eq!(store.count().await.unwrap(), 6);
    assert!(store.exists(&canonical_url(&site_b.url(1))).await.unwrap());
}

#[tokio::test]
async fn test_second_run_saves_nothing_new() {
    let site = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Valid, Page::Valid, Page::Valid]));
    let store = Arc::new(MemoryRecipeStore::new());
    let service = service(vec![site], store.clone(), test_config());

    let first = service.start_search(request(10)).unwrap();
    let first = finish(&service, &first.job_id).await;
    assert_eq!(first.total_new, 3);

    let second = service.start_search(request(10)).unwrap();
    let second = finish(&service, &second.job_id).await;
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(second.total_new, 0);
    assert_eq!(second.total_duplicate, 3);
    assert_balanced(&second);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_language_discards_are_counted() {
    let site = Arc::new(ScriptedSite::new(
        "Site A",
        "a.test",
        &[Page::Valid, Page::English, Page::English],
    ));
    let store = Arc::new(MemoryRecipeStore::new());
    let service = service(vec![site], store.clone(), test_config());

    let started = service.start_search(request(10)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.total_found, 3);
    assert_eq!(result.total_new, 1);
    assert_eq!(result.total_discarded_language, 2);
    assert_balanced(&result);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_network_failures_stay_on_their_site() {
    let broken = Arc::new(ScriptedSite::new(
        "Broken",
        "broken.test",
        &[Page::NetworkError, Page::NetworkError],
    ));
    let healthy = Arc::new(ScriptedSite::new("Healthy", "healthy.test", &[Page::Valid, Page::Valid]));
    let store = Arc::new(MemoryRecipeStore::new());
    let service = service(vec![broken.clone(), healthy], store, test_config());

    let started = service.start_search(request(10)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);

    let broken_status = result.site("Broken").unwrap();
    assert_eq!(broken_status.state, SiteState::Error);
    assert_eq!(broken_status.counters.errors, 2);
    assert_eq!(broken_status.counters.found, 0);
    assert!(broken_status.error_message.is_some());
    // one retry per url
    assert_eq!(broken.extracted(), 4);

    let healthy_status = result.site("Healthy").unwrap();
    assert_eq!(healthy_status.state, SiteState::Completed);
    assert_eq!(healthy_status.counters.new, 2);
    assert_eq!(result.total_errors, 2);
    assert_balanced(&result);
}

#[tokio::test]
async fn test_discovery_failure_marks_site_error() {
    let down = Arc::new(ScriptedSite::new("Down", "down.test", &[Page::Valid]).failing_discovery());
    let up = Arc::new(ScriptedSite::new("Up", "up.test", &[Page::Valid]));
    let service = service(vec![down, up], Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(10)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.site("Down").unwrap().state, SiteState::Error);
    assert_eq!(result.site("Up").unwrap().counters.new, 1);
}

#[tokio::test]
async fn test_strategy_boundary() {
    let site = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Valid]));
    let service = service(vec![site], Arc::new(MemoryRecipeStore::new()), test_config());

    for (cap, expected) in [
        (49, Strategy::Parallel),
        (50, Strategy::Parallel),
        (51, Strategy::Sequential),
    ] {
        let started = service.start_search(request(cap)).unwrap();
        assert_eq!(started.strategy, expected, "cap {}", cap);
        let result = finish(&service, &started.job_id).await;
        assert_eq!(result.strategy, expected);
        assert_eq!(result.result_cap, cap);
    }
}

#[tokio::test]
async fn test_zero_cap_is_rejected() {
    let site = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Valid]));
    let service = service(vec![site], Arc::new(MemoryRecipeStore::new()), test_config());

    let err = service.start_search(request(0)).unwrap_err();
    assert!(matches!(err, SearchError::InvalidCap(0)));
    assert_eq!(service.job_count(), 0);
}

#[tokio::test]
async fn test_cap_limits_found_across_sites() {
    let pages = vec![Page::Valid; 8];
    let site_a = Arc::new(ScriptedSite::new("Site A", "a.test", &pages));
    let site_b = Arc::new(ScriptedSite::new("Site B", "b.test", &pages));
    let service = service(vec![site_a, site_b], Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(6)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);
    assert!(result.total_found <= 6);
    for site in &result.sites {
        assert!(site.counters.found <= 3, "{} over its quota", site.name);
    }
    assert_balanced(&result);
}

#[tokio::test]
async fn test_cap_holds_with_more_sites_than_cap() {
    let pages = vec![Page::Slow(Duration::from_millis(50)); 3];
    let sites: Vec<Arc<ScriptedSite>> = ["a", "b", "c"]
        .iter()
        .map(|n| Arc::new(ScriptedSite::new(n, &format!("{}.test", n), &pages)))
        .collect();
    let service = service(sites, Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(1)).unwrap();
    assert_eq!(started.strategy, Strategy::Parallel);
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.total_found, 1);
    assert_eq!(result.total_new, 1);
    assert_balanced(&result);
}

#[tokio::test]
async fn test_parallel_sites_respect_concurrency_limit() {
    let gauge = Arc::new(Gauge::default());
    let pages = vec![Page::Slow(Duration::from_millis(30)); 2];
    let sites: Vec<Arc<ScriptedSite>> = (0..5)
        .map(|i| {
            Arc::new(
                ScriptedSite::new(&format!("Site {}", i), &format!("s{}.test", i), &pages)
                    .with_gauge(gauge.clone()),
            )
        })
        .collect();
    let mut config = test_config();
    config.runner.max_parallel_sites = 2;
    let service = service(sites, Arc::new(MemoryRecipeStore::new()), config);

    let started = service.start_search(request(10)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.total_new, 10);
    assert!(gauge.peak() <= 2, "{} sites ran at once", gauge.peak());
    assert!(gauge.peak() >= 1);
}

#[tokio::test]
async fn test_cancel_freezes_parallel_sites() {
    let pages = vec![Page::Slow(Duration::from_millis(30)); 10];
    let sites: Vec<Arc<ScriptedSite>> = (0..5)
        .map(|i| Arc::new(ScriptedSite::new(&format!("Site {}", i), &format!("s{}.test", i), &pages)))
        .collect();
    let mut config = test_config();
    config.runner.max_parallel_sites = 2;
    let service = service(sites.clone(), Arc::new(MemoryRecipeStore::new()), config);

    let started = service.start_search(request(50)).unwrap();
    assert_eq!(started.strategy, Strategy::Parallel);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = service.get_progress(&started.job_id).await.unwrap();
    service.cancel(&started.job_id).await.unwrap();

    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Cancelled);
    assert_balanced(&result);

    for site in &result.sites {
        let earlier = before.site(&site.name).unwrap();
        if matches!(site.state, SiteState::Completed | SiteState::Error) {
            assert_eq!(site.state, earlier.state, "{} moved after cancel", site.name);
        }
    }
    let pending: Vec<_> = result.sites.iter().filter(|s| s.state == SiteState::Pending).collect();
    assert_eq!(pending.len(), 3);
    for status in pending {
        let site = sites.iter().find(|s| s.name() == status.name).unwrap();
        assert_eq!(site.extracted(), 0, "{} started after cancel", status.name);
    }
    assert_eq!(
        result.sites.iter().filter(|s| s.state == SiteState::InProgress).count(),
        2
    );
}

#[tokio::test]
async fn test_cancel_between_sequential_sites() {
    let first = Arc::new(ScriptedSite::new("First", "first.test", &[Page::Valid, Page::Valid]));
    let second = Arc::new(ScriptedSite::new("Second", "second.test", &[Page::Valid, Page::Valid]));
    let mut config = test_config();
    config.runner.sequential_site_delay = Duration::from_secs(30);
    let service = service(vec![first, second.clone()], Arc::new(MemoryRecipeStore::new()), config);

    let started = service.start_search(request(100)).unwrap();
    assert_eq!(started.strategy, Strategy::Sequential);

    // wait until the first site is done and the job sits in the pause
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let progress = service.get_progress(&started.job_id).await.unwrap();
        if progress.site("First").unwrap().state == SiteState::Completed {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "first site never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let ack = service.cancel(&started.job_id).await.unwrap();
    assert!(ack.accepted);

    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Cancelled);
    assert_eq!(result.site("First").unwrap().counters.new, 2);
    assert_eq!(result.site("Second").unwrap().state, SiteState::Pending);
    assert_eq!(second.extracted(), 0);
    assert_balanced(&result);

    // cancelling a finished job is a no-op
    let again = service.cancel(&started.job_id).await.unwrap();
    assert!(!again.accepted);
    assert_eq!(again.state, JobState::Cancelled);
}

#[tokio::test]
async fn test_cancel_stops_parallel_job() {
    let pages = vec![Page::Slow(Duration::from_millis(50)); 20];
    let site = Arc::new(ScriptedSite::new("Slow", "slow.test", &pages));
    let service = service(vec![site.clone()], Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(20)).unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    service.cancel(&started.job_id).await.unwrap();

    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Cancelled);
    assert!(result.total_found < 20);
    assert!(site.extracted() < 20);
    assert_balanced(&result);
}

#[tokio::test]
async fn test_panicking_adapter_errors_the_job() {
    let site = Arc::new(ScriptedSite::new("Buggy", "buggy.test", &[Page::Valid, Page::Panic]));
    let service = service(vec![site], Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(10)).unwrap();
    let result = finish(&service, &started.job_id).await;
    assert_eq!(result.state, JobState::Errored);
    assert!(result.errors.iter().any(|e| e.contains("orchestrator fault")));
    assert_balanced(&result);
}

#[tokio::test]
async fn test_unknown_sites_fall_back_to_all() {
    let site_a = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Valid]));
    let site_b = Arc::new(ScriptedSite::new("Site B", "b.test", &[Page::Valid]));
    let service = service(vec![site_a, site_b], Arc::new(MemoryRecipeStore::new()), test_config());

    let only_b = service
        .start_search(SearchRequest {
            sites: vec!["site b".to_string(), "nowhere".to_string()],
            ..request(10)
        })
        .unwrap();
    let only_b = finish(&service, &only_b.job_id).await;
    assert_eq!(only_b.sites.len(), 1);
    assert_eq!(only_b.sites[0].name, "Site B");

    let fallback = service
        .start_search(SearchRequest {
            sites: vec!["nowhere".to_string()],
            ..request(10)
        })
        .unwrap();
    let fallback = finish(&service, &fallback.job_id).await;
    assert_eq!(fallback.sites.len(), 2);
}

#[tokio::test]
async fn test_result_and_removal() {
    let site = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Valid]));
    let service = service(vec![site], Arc::new(MemoryRecipeStore::new()), test_config());

    let started = service.start_search(request(10)).unwrap();
    finish(&service, &started.job_id).await;

    let result = service.get_result(&started.job_id).await.unwrap();
    assert_eq!(result.progress_percentage, 100);
    let removed = service.remove(&started.job_id).await.unwrap();
    assert_eq!(removed.job_id, started.job_id);
    assert!(matches!(
        service.get_progress(&started.job_id).await,
        Err(SearchError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_polled_progress_makes_finished_job_prunable() {
    let site = Arc::new(ScriptedSite::new("Site A", "a.test", &[Page::Slow(Duration::from_millis(20))]));
    let mut config = test_config();
    config.job_ttl = Duration::ZERO;
    let service = service(vec![site], Arc::new(MemoryRecipeStore::new()), config);

    let started = service.start_search(request(10)).unwrap();
    assert_eq!(service.prune(), 0);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let progress = service.get_progress(&started.job_id).await.unwrap();
        if progress.state.is_terminal() {
            assert_eq!(progress.state, JobState::Completed);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(service.prune(), 1);
    assert_eq!(service.job_count(), 0);
}
