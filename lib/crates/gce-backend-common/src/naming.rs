//! Cloud resource naming helpers
//!
//! Instance URLs look like
//! `https://www.googleapis.com/compute/v1/projects/{p}/zones/{z}/instances/{name}`;
//! the instance name is always the last path segment.

/// Extract the instance name from a compute instance URL.
///
/// Returns `None` when the URL has no non-empty last path segment.
pub fn extract_instance_name(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

/// Fully qualified name of a Pub/Sub subscription.
pub fn full_subscription_name(project: &str, subscription: &str) -> String {
    format!("projects/{project}/subscriptions/{subscription}")
}
