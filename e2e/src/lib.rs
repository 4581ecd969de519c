#[cfg(test)]
mod timeout_per_subgraph;
