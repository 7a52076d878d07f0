/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_endpoint_rules::{Endpoint, EndpointProvider, Params, ResolveEndpoint, Value};
use pretty_assertions::assert_eq;
use serde_json::Value as Json;
use std::sync::Arc;

const RULE_SET: &str = include_str!("fixtures/regional-service.json");
const TEST_CASES: &str = include_str!("fixtures/regional-service-tests.json");

fn provider() -> EndpointProvider {
    EndpointProvider::with_builtin_partitions(RULE_SET).expect("valid rule set")
}

fn params(json: &Json) -> Params {
    let mut params = Params::new();
    for (name, value) in json.as_object().expect("params is an object") {
        params.set(name.clone(), Value::from_json(value.clone()).unwrap());
    }
    params
}

fn expected_endpoint(json: &Json) -> Endpoint {
    let mut endpoint = Endpoint::new(json["url"].as_str().unwrap());
    if let Some(properties) = json["properties"].as_object() {
        for (name, value) in properties {
            endpoint = endpoint.with_property(name.clone(), Value::from_json(value.clone()).unwrap());
        }
    }
    if let Some(headers) = json["headers"].as_object() {
        for (name, values) in headers {
            for value in values.as_array().unwrap() {
                endpoint = endpoint.with_header(name.clone(), value.as_str().unwrap());
            }
        }
    }
    endpoint
}

#[test]
fn test_cases() {
    let provider = provider();
    let cases: Json = serde_json::from_str(TEST_CASES).unwrap();
    let cases = cases["testCases"].as_array().unwrap();
    assert!(!cases.is_empty());

    for case in cases {
        let documentation = case["documentation"].as_str().unwrap();
        let result = provider.resolve_endpoint(&params(&case["params"]));
        let expect = &case["expect"];
        match (result, expect.get("endpoint"), expect.get("error")) {
            (Ok(endpoint), Some(expected), None) => {
                assert_eq!(endpoint, expected_endpoint(expected), "{documentation}")
            }
            (Err(err), None, Some(expected)) => {
                assert_eq!(err.to_string(), expected.as_str().unwrap(), "{documentation}")
            }
            (result, _, _) => panic!("{documentation}: unexpected result {result:?}"),
        }
    }
}

#[test]
fn cached_results_match_fresh_ones() {
    let provider = provider();
    let params = Params::new().with("Region", "eu-west-1").with("UseFIPS", true);
    let first = provider.resolve_endpoint(&params).unwrap();
    let cached = provider.resolve_endpoint(&params).unwrap();
    let uncached = self::provider()
        .with_cache_size(0)
        .resolve_endpoint(&params)
        .unwrap();
    assert_eq!(first, cached);
    assert_eq!(first, uncached);
    assert_eq!(first.url(), "https://svc-fips.eu-west-1.amazonaws.com");
}

#[test]
fn errors_are_returned_every_time() {
    let provider = provider();
    let params = Params::new()
        .with("Region", "us-east-1")
        .with("Endpoint", "https://example.com")
        .with("UseFIPS", true);
    for _ in 0..2 {
        let err = provider.resolve_endpoint(&params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Configuration: FIPS and custom endpoint are not supported"
        );
    }
}

#[test]
fn wrong_parameter_types_fail_before_evaluation() {
    let err = provider()
        .resolve_endpoint(&Params::new().with("Region", "us-east-1").with("UseFIPS", "yes"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Value (UseFIPS) is the wrong type. Must be boolean."
    );
}

#[test]
fn providers_can_be_shared_between_threads() {
    let provider: Arc<dyn ResolveEndpoint> = Arc::new(provider());
    let regions = ["us-east-1", "us-west-2", "eu-west-1", "cn-north-1", "ap-south-1"];
    std::thread::scope(|scope| {
        for region in regions {
            let provider = provider.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let endpoint = provider
                        .resolve_endpoint(&Params::new().with("Region", region))
                        .unwrap();
                    assert!(endpoint.url().starts_with(&format!("https://svc.{region}.")));
                }
            });
        }
    });
}

#[test]
fn parameters_are_exposed() {
    let provider = provider();
    let parameters = provider.ruleset().parameters();
    assert_eq!(parameters["Region"].builtin(), Some("AWS::Region"));
    assert_eq!(
        parameters["UseDualStack"].default_value(),
        Some(&Value::Bool(false))
    );
    assert!(!parameters["Bucket"].is_required());
}
