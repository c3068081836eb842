use std::collections::BTreeSet;
use wildfly_orchestrator::deployment::{DeploymentDescriptor, MatchStrategy, match_deployments};
use wildfly_orchestrator::error::{Error, ErrorKind};

fn standalone_deployments() -> Vec<DeploymentDescriptor> {
    vec![
        DeploymentDescriptor::new("app-a.war"),
        DeploymentDescriptor::new("app-b.war"),
        DeploymentDescriptor::new("other.war"),
    ]
}

fn names(matched: &BTreeSet<wildfly_orchestrator::deployment::UndeployRequest>) -> Vec<&str> {
    matched.iter().map(|r| r.name()).collect()
}

fn groups(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|g| g.to_string()).collect()
}

#[test]
fn test_fail_strategy_rejects_ambiguous_pattern() {
    let err = match_deployments(
        "app-.*",
        &standalone_deployments(),
        &BTreeSet::new(),
        MatchStrategy::Fail,
        true,
    )
    .unwrap_err();

    match &err {
        Error::AmbiguousMatch { count, pattern, matches } => {
            assert_eq!(*count, 2);
            assert_eq!(pattern, "app-.*");
            assert_eq!(matches, &vec!["app-a.war".to_string(), "app-b.war".to_string()]);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::AmbiguousMatch);
}

#[test]
fn test_fail_strategy_accepts_single_match() {
    let matched = match_deployments(
        "other\\.war",
        &standalone_deployments(),
        &BTreeSet::new(),
        MatchStrategy::Fail,
        true,
    )
    .unwrap();

    assert_eq!(names(&matched), vec!["other.war"]);
    assert!(matched.iter().all(|r| r.fail_on_missing()));
}

#[test]
fn test_first_strategy_takes_one_match() {
    let matched = match_deployments(
        "app-.*",
        &standalone_deployments(),
        &BTreeSet::new(),
        MatchStrategy::First,
        false,
    )
    .unwrap();

    assert_eq!(names(&matched), vec!["app-a.war"]);
}

#[test]
fn test_all_strategy_takes_every_match() {
    let matched = match_deployments(
        "app-.*",
        &standalone_deployments(),
        &BTreeSet::new(),
        MatchStrategy::All,
        false,
    )
    .unwrap();

    assert_eq!(names(&matched), vec!["app-a.war", "app-b.war"]);
    assert!(matched.iter().all(|r| r.target_groups().is_empty()));
}

#[test]
fn test_no_match_is_empty_for_every_strategy() {
    for strategy in [MatchStrategy::First, MatchStrategy::All, MatchStrategy::Fail] {
        let matched = match_deployments(
            "missing-.*",
            &standalone_deployments(),
            &BTreeSet::new(),
            strategy,
            true,
        )
        .unwrap();
        assert!(matched.is_empty(), "strategy {}", strategy);
    }
}

#[test]
fn test_requested_groups_restrict_matches() {
    let deployments = vec![
        DeploymentDescriptor::new("app-a.war").with_groups(["main", "backup"]),
        DeploymentDescriptor::new("app-b.war").with_groups(["other"]),
        DeploymentDescriptor::new("app-c.war"),
    ];

    let matched = match_deployments(
        "app-.*",
        &deployments,
        &groups(&["main", "staging"]),
        MatchStrategy::All,
        true,
    )
    .unwrap();

    assert_eq!(names(&matched), vec!["app-a.war"]);
    let request = matched.iter().next().unwrap();
    assert_eq!(request.target_groups(), &groups(&["main"]));
}

#[test]
fn test_without_requested_groups_all_groups_are_targeted() {
    let deployments = vec![DeploymentDescriptor::new("app-a.war").with_groups(["main", "backup"])];

    let matched = match_deployments("app-a.war", &deployments, &BTreeSet::new(), MatchStrategy::Fail, true)
        .unwrap();

    assert_eq!(names(&matched), vec!["app-a.war"]);
    assert!(matched.iter().next().unwrap().target_groups().is_empty());
}

#[test]
fn test_strategy_parsed_from_config_value() {
    let strategy: MatchStrategy = serde_json::from_str("\"ALL\"").unwrap();
    assert_eq!(strategy, MatchStrategy::All);
    assert_eq!(serde_json::to_string(&MatchStrategy::First).unwrap(), "\"first\"");

    let err = serde_json::from_str::<MatchStrategy>("\"newest\"").unwrap_err();
    assert!(err.to_string().contains("first, all, fail"));
}
