mod common;

use common::{org, project, quiet_logger, EventReply, FakeApi};
use hub_mcp::constants::cache_keys;
use hub_mcp::services::cache::{project_event_fields_key, CacheEntry, ResolutionCache};
use hub_mcp::services::insight_hub_api::InsightHubApi;
use hub_mcp::services::resolver::InsightHubResolver;
use std::sync::Arc;
use std::time::Duration;

fn resolver(api: Arc<FakeApi>, key: Option<&str>) -> InsightHubResolver {
    let logger = quiet_logger();
    let cache = Arc::new(ResolutionCache::new(logger.clone()));
    let api: Arc<dyn InsightHubApi> = api;
    InsightHubResolver::new(api, cache, key.map(str::to_string), logger)
}

fn two_projects() -> FakeApi {
    FakeApi::new(vec![org("Acme")], vec![project("p1", "k1"), project("p2", "k2")])
        .with_fields("p1", &["search", "error.status", "user.email"])
        .with_fields("p2", &["error.status"])
}

#[tokio::test]
async fn organization_and_projects_are_fetched_once() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), None);

    let first = resolver.get_projects().await.expect("projects");
    let second = resolver.get_projects().await.expect("cached projects");
    let org_a = resolver.get_organization().await.expect("org");
    let org_b = resolver.get_organization().await.expect("cached org");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&org_a, &org_b));
    assert_eq!(api.calls("list_organizations"), 1);
    assert_eq!(api.calls("list_projects"), 1);
}

#[tokio::test]
async fn current_project_matches_key_and_strips_denylisted_fields() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), Some("k1"));

    let current = resolver
        .get_current_project()
        .await
        .expect("resolution")
        .expect("current project");
    assert_eq!(current.id, "p1");

    let fields = resolver
        .cached_current_event_fields()
        .expect("schema cached with the project");
    let ids: Vec<_> = fields.iter().map(|f| f.display_id.as_str()).collect();
    assert_eq!(ids, vec!["error.status", "user.email"]);

    let again = resolver
        .get_current_project()
        .await
        .expect("resolution")
        .expect("current project");
    assert!(Arc::ptr_eq(&current, &again));
    let schema = resolver
        .get_project_event_fields(&current)
        .await
        .expect("schema");
    assert!(Arc::ptr_eq(&schema, &fields));

    assert_eq!(api.calls("list_projects"), 1);
    assert_eq!(api.calls("list_event_fields"), 1);
}

#[tokio::test]
async fn unknown_key_names_key_and_organization() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api, Some("k9"));

    let err = resolver
        .get_current_project()
        .await
        .expect_err("no project has k9");
    assert_eq!(
        err.message,
        "Unable to find project with API key k9 in organization Acme."
    );
}

#[tokio::test]
async fn no_key_means_no_current_project_and_no_calls() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), None);

    assert!(resolver.get_current_project().await.expect("ok").is_none());
    assert!(resolver.cached_current_event_fields().is_none());
    assert_eq!(api.calls("list_organizations"), 0);
}

#[tokio::test]
async fn empty_organization_list_is_an_error() {
    let api = Arc::new(FakeApi::new(Vec::new(), Vec::new()));
    let resolver = resolver(api, None);

    let err = resolver.get_organization().await.expect_err("no orgs");
    assert_eq!(err.message, "No organizations found for the current user.");
}

#[tokio::test]
async fn initialize_fails_when_schema_is_only_denylisted_fields() {
    let api = Arc::new(
        FakeApi::new(vec![org("Acme")], vec![project("p1", "k1")]).with_fields("p1", &["search"]),
    );
    let resolver = resolver(api, Some("k1"));

    let err = resolver.initialize().await.expect_err("empty schema");
    assert_eq!(err.message, "No event fields found for project Project p1.");
    assert!(resolver.cache().project(cache_keys::CURRENT_PROJECT).is_none());
}

#[tokio::test]
async fn initialize_resolves_everything_up_front() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), Some("k2"));

    resolver.initialize().await.expect("initialized");
    let current = resolver
        .cache()
        .project(cache_keys::CURRENT_PROJECT)
        .expect("current project cached");
    assert_eq!(current.id, "p2");
    assert_eq!(api.calls("list_organizations"), 1);
    assert_eq!(api.calls("list_event_fields"), 1);
}

#[tokio::test]
async fn other_project_schema_is_cached_under_its_own_key() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), Some("k1"));
    resolver.initialize().await.expect("initialized");

    let other = resolver
        .get_project("p2")
        .await
        .expect("lookup")
        .expect("p2 exists");
    let first = resolver.get_project_event_fields(&other).await.expect("schema");
    let second = resolver.get_project_event_fields(&other).await.expect("schema");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(resolver
        .cache()
        .event_fields(&project_event_fields_key("p2"))
        .is_some());
    assert_eq!(api.calls("list_event_fields"), 2);
}

#[tokio::test]
async fn resolve_input_project_reports_missing_inputs() {
    let api = Arc::new(two_projects());
    let unscoped = resolver(api.clone(), None);

    let err = unscoped
        .resolve_input_project(Some("p9"))
        .await
        .expect_err("unknown id");
    assert_eq!(err.message, "Project with ID p9 not found.");

    let err = unscoped
        .resolve_input_project(None)
        .await
        .expect_err("no current project");
    assert_eq!(err.code, "NO_CURRENT_PROJECT");

    let scoped = resolver(api, Some("k1"));
    let explicit = scoped.resolve_input_project(Some("p2")).await.expect("explicit wins");
    assert_eq!(explicit.id, "p2");
    let implicit = scoped.resolve_input_project(None).await.expect("current");
    assert_eq!(implicit.id, "p1");
}

#[tokio::test]
async fn legacy_project_list_is_matched_by_api_key() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), Some("k1"));
    resolver.cache().set(
        cache_keys::LEGACY_CURRENT_PROJECTS,
        CacheEntry::Projects(Arc::new(vec![project("p2", "k2"), project("p1", "k1")])),
    );

    let current = resolver
        .get_current_project()
        .await
        .expect("resolution")
        .expect("legacy entry");
    assert_eq!(current.id, "p1");
    assert_eq!(api.calls("list_projects"), 0);

    let fields = resolver
        .cached_current_event_fields()
        .expect("schema cached for the legacy match");
    assert_eq!(fields.len(), 2);
    assert_eq!(api.calls("list_event_fields"), 1);
    assert!(resolver.cache().project(cache_keys::CURRENT_PROJECT).is_some());
}

#[tokio::test]
async fn legacy_list_without_the_key_falls_back_to_fetched_projects() {
    let api = Arc::new(two_projects());
    let resolver = resolver(api.clone(), Some("k2"));
    resolver.cache().set(
        cache_keys::LEGACY_CURRENT_PROJECTS,
        CacheEntry::Projects(Arc::new(vec![project("p1", "k1")])),
    );

    let current = resolver
        .get_current_project()
        .await
        .expect("resolution")
        .expect("fetched project");
    assert_eq!(current.id, "p2");
    assert_eq!(api.calls("list_projects"), 1);
}

#[tokio::test]
async fn concurrent_first_resolutions_agree_on_current_project() {
    let mut fake = two_projects();
    fake.project_fetch_delay = Duration::from_millis(20);
    let api = Arc::new(fake);
    let resolver = resolver(api, Some("k1"));

    let (a, b) = tokio::join!(resolver.get_current_project(), resolver.get_current_project());
    let a = a.expect("first").expect("project");
    let b = b.expect("second").expect("project");
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn event_search_skips_failing_projects() {
    let api = Arc::new(
        two_projects()
            .with_event("p1", EventReply::Fail(500), 0)
            .with_event("p2", EventReply::Found(serde_json::json!({ "project": "p2" })), 0),
    );
    let resolver = resolver(api.clone(), None);

    let event = resolver
        .find_event_across_projects("ev-1", None)
        .await
        .expect("search")
        .expect("found in p2");
    assert_eq!(event["project"], "p2");
    assert_eq!(event["requested_id"], "ev-1");
    assert_eq!(api.calls("view_event"), 2);
}

#[tokio::test]
async fn event_search_prefers_first_completed_hit() {
    let api = Arc::new(
        two_projects()
            .with_event("p1", EventReply::Found(serde_json::json!({ "project": "p1" })), 150)
            .with_event("p2", EventReply::Found(serde_json::json!({ "project": "p2" })), 0),
    );
    let resolver = resolver(api, None);

    let event = resolver
        .find_event_across_projects("ev-1", None)
        .await
        .expect("search")
        .expect("found");
    assert_eq!(event["project"], "p2");
}

#[tokio::test]
async fn event_search_without_hits_is_none() {
    let api = Arc::new(
        two_projects()
            .with_event("p1", EventReply::Missing, 0)
            .with_event("p2", EventReply::Fail(404), 0),
    );
    let resolver = resolver(api, None);

    let found = resolver
        .find_event_across_projects("ev-1", None)
        .await
        .expect("search completes");
    assert!(found.is_none());
}

#[tokio::test]
async fn event_search_in_explicit_project() {
    let api = Arc::new(
        two_projects()
            .with_event("p1", EventReply::Found(serde_json::json!({ "project": "p1" })), 0)
            .with_event("p2", EventReply::Fail(503), 0),
    );
    let resolver = resolver(api.clone(), None);

    let hit = resolver
        .find_event_across_projects("ev-1", Some("p1"))
        .await
        .expect("lookup");
    assert_eq!(hit.map(|e| e["project"].clone()), Some(serde_json::json!("p1")));
    assert_eq!(api.calls("view_event"), 1);

    let err = resolver
        .find_event_across_projects("ev-1", Some("p2"))
        .await
        .expect_err("non-404 failure propagates");
    assert_eq!(err.upstream_status(), Some(503));

    let err = resolver
        .find_event_across_projects("ev-1", Some("p9"))
        .await
        .expect_err("unknown project");
    assert_eq!(err.message, "Project with ID p9 not found.");
}
