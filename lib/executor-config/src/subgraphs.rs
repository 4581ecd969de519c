use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Registered subgraph services, keyed by the service name used in `Fetch` nodes.
pub type SubgraphsConfig = HashMap<String, SubgraphConfig>;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubgraphConfig {
    /// The GraphQL endpoint of the subgraph, for example `http://localhost:4001/graphql`.
    pub url: url::Url,
}
