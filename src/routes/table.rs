//! Explicit route table: `(method, path pattern, query constraint) -> operation`.
//!
//! Several rules can match one request (every blob fetch is a `GET`), so
//! resolution picks the most specific matching rule instead of the first
//! one declared:
//!
//! 1. exact path beats any path;
//! 2. a required query parameter beats a forbidden one, which beats none;
//! 3. remaining ties go to the earlier [`Operation`] variant.
//!
//! The outcome never depends on the order rules were added in.

use axum::http::Method;
use std::collections::HashMap;

use crate::handlers::object_handlers::{COPY_SOURCE_PARAM, METADATA_TARGET_PARAM};

/// Blob operations, in tie-break precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    HeadBlob,
    GetBlob,
    CopyBlob,
    PutBlob,
    DeleteBlobs,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::HeadBlob => "head",
            Operation::GetBlob => "get",
            Operation::CopyBlob => "copy",
            Operation::PutBlob => "put",
            Operation::DeleteBlobs => "delete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPattern {
    Exact(&'static str),
    Any,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryRule {
    Requires(&'static str),
    Forbids(&'static str),
    Unconstrained,
}

#[derive(Clone, Debug)]
pub struct Route {
    pub method: Method,
    pub path: PathPattern,
    pub query: QueryRule,
    pub operation: Operation,
}

impl Route {
    pub fn new(method: Method, path: PathPattern, query: QueryRule, operation: Operation) -> Self {
        Self {
            method,
            path,
            query,
            operation,
        }
    }

    fn matches(&self, method: &Method, path: &str, query: &HashMap<String, String>) -> bool {
        if self.method != *method {
            return false;
        }
        let path_ok = match self.path {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Any => true,
        };
        let query_ok = match self.query {
            QueryRule::Requires(param) => query.contains_key(param),
            QueryRule::Forbids(param) => !query.contains_key(param),
            QueryRule::Unconstrained => true,
        };
        path_ok && query_ok
    }

    /// (path rank, query rank); higher is more specific.
    fn specificity(&self) -> (u8, u8) {
        let path = match self.path {
            PathPattern::Exact(_) => 1,
            PathPattern::Any => 0,
        };
        let query = match self.query {
            QueryRule::Requires(_) => 2,
            QueryRule::Forbids(_) => 1,
            QueryRule::Unconstrained => 0,
        };
        (path, query)
    }
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The blob API surface.
    pub fn standard() -> Self {
        Self::new(vec![
            Route::new(
                Method::GET,
                PathPattern::Exact("/"),
                QueryRule::Requires(METADATA_TARGET_PARAM),
                Operation::HeadBlob,
            ),
            Route::new(
                Method::GET,
                PathPattern::Any,
                QueryRule::Forbids(METADATA_TARGET_PARAM),
                Operation::GetBlob,
            ),
            Route::new(
                Method::PUT,
                PathPattern::Any,
                QueryRule::Requires(COPY_SOURCE_PARAM),
                Operation::CopyBlob,
            ),
            Route::new(
                Method::PUT,
                PathPattern::Any,
                QueryRule::Forbids(COPY_SOURCE_PARAM),
                Operation::PutBlob,
            ),
            Route::new(
                Method::POST,
                PathPattern::Exact("/delete"),
                QueryRule::Unconstrained,
                Operation::DeleteBlobs,
            ),
        ])
    }

    /// The operation for a request, or `None` when no rule matches.
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
        query: &HashMap<String, String>,
    ) -> Option<Operation> {
        self.routes
            .iter()
            .filter(|route| route.matches(method, path, query))
            .max_by(|a, b| {
                a.specificity()
                    .cmp(&b.specificity())
                    .then_with(|| b.operation.cmp(&a.operation))
            })
            .map(|route| route.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn samples() -> Vec<(Method, &'static str, HashMap<String, String>, Option<Operation>)> {
        vec![
            (Method::GET, "/a.txt", query(&[]), Some(Operation::GetBlob)),
            (Method::GET, "/a.txt", query(&[("download", "1")]), Some(Operation::GetBlob)),
            (Method::GET, "/", query(&[("url", "/a.txt")]), Some(Operation::HeadBlob)),
            (Method::GET, "/a.txt", query(&[("url", "/b.txt")]), None),
            (Method::PUT, "/a.txt", query(&[]), Some(Operation::PutBlob)),
            (Method::PUT, "/b.txt", query(&[("fromUrl", "/a.txt")]), Some(Operation::CopyBlob)),
            (Method::POST, "/delete", query(&[]), Some(Operation::DeleteBlobs)),
            (Method::POST, "/a.txt", query(&[]), None),
            (Method::DELETE, "/a.txt", query(&[]), None),
            (Method::HEAD, "/a.txt", query(&[]), None),
        ]
    }

    #[test]
    fn test_standard_table_resolution() {
        let table = RouteTable::standard();
        for (method, path, q, expected) in samples() {
            assert_eq!(
                table.resolve(&method, path, &q),
                expected,
                "{} {} {:?}",
                method,
                path,
                q
            );
        }
    }

    #[test]
    fn test_resolution_ignores_declaration_order() {
        let mut routes = RouteTable::standard().routes;
        routes.reverse();
        let reversed = RouteTable::new(routes.clone());
        routes.rotate_left(2);
        let rotated = RouteTable::new(routes);

        for (method, path, q, expected) in samples() {
            assert_eq!(reversed.resolve(&method, path, &q), expected);
            assert_eq!(rotated.resolve(&method, path, &q), expected);
        }
    }

    #[test]
    fn test_exact_path_outranks_any_path() {
        let generic = Route::new(
            Method::GET,
            PathPattern::Any,
            QueryRule::Requires("url"),
            Operation::GetBlob,
        );
        let exact = Route::new(
            Method::GET,
            PathPattern::Exact("/"),
            QueryRule::Requires("url"),
            Operation::HeadBlob,
        );
        let q = query(&[("url", "/a.txt")]);

        for table in [
            RouteTable::new(vec![generic.clone(), exact.clone()]),
            RouteTable::new(vec![exact, generic]),
        ] {
            assert_eq!(table.resolve(&Method::GET, "/", &q), Some(Operation::HeadBlob));
            assert_eq!(table.resolve(&Method::GET, "/x", &q), Some(Operation::GetBlob));
        }
    }

    #[test]
    fn test_required_param_outranks_unconstrained() {
        let plain = Route::new(
            Method::PUT,
            PathPattern::Any,
            QueryRule::Unconstrained,
            Operation::PutBlob,
        );
        let copy = Route::new(
            Method::PUT,
            PathPattern::Any,
            QueryRule::Requires("fromUrl"),
            Operation::CopyBlob,
        );
        let table = RouteTable::new(vec![plain, copy]);

        assert_eq!(
            table.resolve(&Method::PUT, "/b", &query(&[("fromUrl", "/a")])),
            Some(Operation::CopyBlob)
        );
        assert_eq!(table.resolve(&Method::PUT, "/b", &query(&[])), Some(Operation::PutBlob));
    }

    #[test]
    fn test_equal_specificity_breaks_ties_by_operation() {
        let put = Route::new(Method::PUT, PathPattern::Any, QueryRule::Unconstrained, Operation::PutBlob);
        let copy = Route::new(Method::PUT, PathPattern::Any, QueryRule::Unconstrained, Operation::CopyBlob);

        for table in [
            RouteTable::new(vec![put.clone(), copy.clone()]),
            RouteTable::new(vec![copy, put]),
        ] {
            assert_eq!(table.resolve(&Method::PUT, "/a", &query(&[])), Some(Operation::CopyBlob));
        }
    }
}
