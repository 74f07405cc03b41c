//! Cluster level tests of oneraft live in `tests/`: one test binary per
//! topic, sharing the cluster fixture in `tests/fixtures/`.
