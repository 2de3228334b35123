// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `traffic.rs`

#[cfg(test)]
mod tests {
    use crate::config::RouteConfig;
    use crate::crd::{Route, TrafficTarget, Visibility};
    use crate::labels::CONFIGURATION_LABEL;
    use crate::route_errors::{TargetError, TrafficError};
    use crate::test_fixtures::{
        configuration, configuration_target, failed_configuration, failed_revision,
        inactive_revision, pending_revision, ready_revision, revision_target, route, tagged,
        FakeListers,
    };
    use crate::traffic::{resolve, validate, Resolution, TrafficConfig};

    fn resolved(route: &Route, listers: &FakeListers) -> TrafficConfig {
        match resolve(route, &RouteConfig::default(), listers).unwrap() {
            Resolution::Resolved(config) => config,
            Resolution::Unresolved { error, .. } => panic!("unexpected target error: {error}"),
        }
    }

    fn target_error(route: &Route, listers: &FakeListers) -> TargetError {
        match resolve(route, &RouteConfig::default(), listers).unwrap() {
            Resolution::Unresolved { error, .. } => error,
            Resolution::Resolved(_) => panic!("expected a target error"),
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    #[test]
    fn test_single_revision_target() {
        let listers = FakeListers::default();
        listers.insert_revision(ready_revision("hello-00001"));
        let route = route("hello", vec![revision_target("hello-00001", 100)]);

        let config = resolved(&route, &listers);

        assert_eq!(config.targets.len(), 1);
        let targets = &config.targets[""];
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].revision_name, "hello-00001");
        assert_eq!(targets[0].percent, 100);
        assert!(!targets[0].latest_revision);
        assert_eq!(config.hosts[""].host, "hello.default.example.com");
        assert_eq!(config.hosts[""].name, "hello");
        assert!(config.references.revisions.contains("hello-00001"));
        assert!(config.references.configurations.is_empty());
    }

    #[test]
    fn test_revision_target_picks_up_configuration_label() {
        let listers = FakeListers::default();
        let mut revision = ready_revision("hello-00001");
        revision.metadata.labels = Some(
            [(CONFIGURATION_LABEL.to_string(), "hello".to_string())].into(),
        );
        listers.insert_revision(revision);
        let route = route("hello", vec![revision_target("hello-00001", 100)]);

        let config = resolved(&route, &listers);
        assert_eq!(
            config.revision_targets[0].configuration_name.as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_configuration_target_follows_latest_ready_revision() {
        let listers = FakeListers::default();
        listers.insert_configuration(configuration("hello", Some("hello-00003")));
        listers.insert_revision(ready_revision("hello-00003"));
        let route = route("hello", vec![configuration_target("hello", 100)]);

        let config = resolved(&route, &listers);

        let target = &config.revision_targets[0];
        assert_eq!(target.revision_name, "hello-00003");
        assert_eq!(target.configuration_name.as_deref(), Some("hello"));
        assert!(target.latest_revision);
        assert!(config.references.configurations.contains("hello"));
        assert!(config.references.revisions.contains("hello-00003"));
    }

    #[test]
    fn test_tagged_split_gets_own_group_and_host() {
        let listers = FakeListers::default();
        listers.insert_revision(ready_revision("hello-00001"));
        listers.insert_revision(ready_revision("hello-00002"));
        let route = route(
            "hello",
            vec![
                revision_target("hello-00001", 90),
                tagged(revision_target("hello-00002", 10), "candidate"),
            ],
        );

        let config = resolved(&route, &listers);

        let shared: Vec<(&str, i64)> = config.targets[""]
            .iter()
            .map(|t| (t.revision_name.as_str(), t.percent))
            .collect();
        assert_eq!(shared, vec![("hello-00001", 90), ("hello-00002", 10)]);
        let candidate = &config.targets["candidate"];
        assert_eq!(candidate.len(), 1);
        assert_eq!(candidate[0].revision_name, "hello-00002");
        assert_eq!(candidate[0].percent, 100);
        assert_eq!(
            config.hosts["candidate"].host,
            "hello-candidate.default.example.com"
        );

        let statuses = config.status_targets();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].tag, None);
        assert_eq!(statuses[0].url, None);
        assert_eq!(statuses[1].tag.as_deref(), Some("candidate"));
        assert_eq!(statuses[1].percent, 10);
        assert_eq!(
            statuses[1].url.as_deref(),
            Some("http://hello-candidate.default.example.com")
        );
    }

    #[test]
    fn test_cluster_local_tag_uses_cluster_domain() {
        let listers = FakeListers::default();
        listers.insert_revision(ready_revision("hello-00001"));
        let mut target = tagged(revision_target("hello-00001", 100), "internal");
        target.visibility = Some(Visibility::ClusterLocal);
        let route = route("hello", vec![target]);

        let config = resolved(&route, &listers);

        let host = &config.hosts["internal"];
        assert_eq!(host.visibility, Visibility::ClusterLocal);
        assert_eq!(host.host, "hello-internal.default.svc.cluster.local");
        assert_eq!(config.hosts[""].visibility, Visibility::Public);
    }

    #[test]
    fn test_inactive_revision_is_routable() {
        let listers = FakeListers::default();
        listers.insert_revision(inactive_revision("hello-00001"));
        let route = route("hello", vec![revision_target("hello-00001", 100)]);

        let config = resolved(&route, &listers);
        assert!(config.revision_targets[0].activation_required);
    }

    // ========================================================================
    // Target errors
    // ========================================================================

    #[test]
    fn test_target_error_kinds() {
        let listers = FakeListers::default();
        listers.insert_configuration(configuration("waiting", None));
        listers.insert_configuration(failed_configuration("broken"));
        listers.insert_configuration(configuration("dangling", Some("gone-00001")));
        listers.insert_revision(pending_revision("pending-00001"));
        listers.insert_revision(failed_revision("failed-00001"));

        let cases = [
            (
                configuration_target("absent", 100),
                TargetError::ConfigurationMissing {
                    name: "absent".to_string(),
                },
            ),
            (
                configuration_target("waiting", 100),
                TargetError::ConfigurationNotReady {
                    name: "waiting".to_string(),
                },
            ),
            (
                configuration_target("broken", 100),
                TargetError::ConfigurationFailed {
                    name: "broken".to_string(),
                },
            ),
            (
                configuration_target("dangling", 100),
                TargetError::RevisionMissing {
                    name: "gone-00001".to_string(),
                },
            ),
            (
                revision_target("absent-00001", 100),
                TargetError::RevisionMissing {
                    name: "absent-00001".to_string(),
                },
            ),
            (
                revision_target("pending-00001", 100),
                TargetError::RevisionNotReady {
                    name: "pending-00001".to_string(),
                },
            ),
            (
                revision_target("failed-00001", 100),
                TargetError::RevisionFailed {
                    name: "failed-00001".to_string(),
                },
            ),
        ];

        for (target, expected) in cases {
            let route = route("hello", vec![target]);
            assert_eq!(target_error(&route, &listers), expected);
        }
    }

    #[test]
    fn test_first_target_error_in_declaration_order_is_reported() {
        let listers = FakeListers::default();
        listers.insert_revision(ready_revision("hello-00001"));
        let route = route(
            "hello",
            vec![
                revision_target("hello-00001", 50),
                revision_target("hello-00009", 25),
                configuration_target("missing", 25),
            ],
        );

        for _ in 0..5 {
            let Resolution::Unresolved { error, references } =
                resolve(&route, &RouteConfig::default(), &listers).unwrap()
            else {
                panic!("expected a target error");
            };
            assert_eq!(
                error,
                TargetError::RevisionMissing {
                    name: "hello-00009".to_string()
                }
            );
            // References cover every target, including those after the failure
            assert!(references.revisions.contains("hello-00001"));
            assert!(references.revisions.contains("hello-00009"));
            assert!(references.configurations.contains("missing"));
        }
    }

    #[test]
    fn test_invalid_tag_template_is_a_hard_error() {
        let listers = FakeListers::default();
        listers.insert_revision(ready_revision("hello-00001"));
        let route = route(
            "hello",
            vec![tagged(revision_target("hello-00001", 100), "candidate")],
        );
        let config = RouteConfig {
            tag_template: "{{.Name}}-{{.Unknown}}".to_string(),
            ..RouteConfig::default()
        };

        let err = resolve(&route, &config, &listers).unwrap_err();
        assert!(matches!(err, TrafficError::Domain(_)));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_accepts_well_formed_traffic() {
        assert!(validate(&[
            revision_target("a", 60),
            tagged(configuration_target("b", 40), "b"),
            tagged(configuration_target("b", 0), "latest"),
        ])
        .is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_traffic() {
        let both = TrafficTarget {
            revision_name: Some("a".to_string()),
            configuration_name: Some("b".to_string()),
            percent: Some(100),
            ..Default::default()
        };
        let neither = TrafficTarget {
            percent: Some(100),
            ..Default::default()
        };

        assert_eq!(validate(&[]), Err(TrafficError::EmptyTraffic));
        assert_eq!(
            validate(&[both]),
            Err(TrafficError::AmbiguousTarget { index: 0 })
        );
        assert_eq!(
            validate(&[revision_target("a", 0), neither]),
            Err(TrafficError::MissingTarget { index: 1 })
        );
        assert_eq!(
            validate(&[revision_target("a", 120)]),
            Err(TrafficError::InvalidPercent {
                index: 0,
                percent: 120
            })
        );
        assert_eq!(
            validate(&[revision_target("a", -10), revision_target("b", 110)]),
            Err(TrafficError::InvalidPercent {
                index: 0,
                percent: -10
            })
        );
        assert_eq!(
            validate(&[
                tagged(revision_target("a", 50), "x"),
                tagged(revision_target("b", 50), "x"),
            ]),
            Err(TrafficError::DuplicateTag {
                tag: "x".to_string()
            })
        );
        assert_eq!(
            validate(&[revision_target("a", 50), revision_target("b", 30)]),
            Err(TrafficError::PercentSum { sum: 80 })
        );
    }

    #[test]
    fn test_malformed_traffic_is_rejected_before_lookup() {
        let listers = FakeListers::default();
        let route = route("hello", vec![revision_target("hello-00001", 50)]);

        assert_eq!(
            resolve(&route, &RouteConfig::default(), &listers),
            Err(TrafficError::PercentSum { sum: 50 })
        );
    }
}
