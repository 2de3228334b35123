// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for route error types.

#[cfg(test)]
mod tests {
    use crate::route_errors::*;

    #[test]
    fn test_revision_missing_message() {
        let error = TargetError::RevisionMissing {
            name: "hello-00002".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Revision \"hello-00002\" referenced in traffic not found."
        );
        assert_eq!(error.reason(), "RevisionMissing");
        assert_eq!(error.target_name(), "hello-00002");
        assert!(!error.is_converging());
    }

    #[test]
    fn test_configuration_failed_is_not_converging() {
        let error = TargetError::ConfigurationFailed {
            name: "hello".to_string(),
        };
        assert!(!error.is_converging());
        assert!(TargetError::RevisionNotReady {
            name: "hello-00001".to_string()
        }
        .is_converging());
        assert_eq!(error.reason(), "ConfigurationFailed");
        assert_eq!(
            error.to_string(),
            "Configuration \"hello\" does not have any ready Revision."
        );
    }

    #[test]
    fn test_traffic_error_messages() {
        assert_eq!(
            TrafficError::PercentSum { sum: 90 }.to_string(),
            "traffic targets sum to 90 percent, expected 100"
        );
        assert_eq!(
            TrafficError::DuplicateTag {
                tag: "current".to_string()
            }
            .to_string(),
            "traffic tag \"current\" is used by more than one target"
        );
    }

    #[test]
    fn test_domain_error_converts_into_traffic_error() {
        let domain = DomainError::InvalidHost {
            host: "-bad.example.com".to_string(),
            reason: "label must start with an alphanumeric character".to_string(),
        };
        let traffic: TrafficError = domain.clone().into();
        assert_eq!(traffic, TrafficError::Domain(domain.clone()));
        assert_eq!(traffic.to_string(), domain.to_string());
    }

    #[test]
    fn test_not_owned_message() {
        let error = ChildError::NotOwned {
            kind: "EdgeIngress".to_string(),
            namespace: "default".to_string(),
            name: "hello".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "EdgeIngress default/hello exists and is not owned by this route"
        );
    }
}
