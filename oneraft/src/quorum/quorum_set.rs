/// A set of quorums, e.g., all the majorities of a member set.
pub(crate) trait QuorumSet<ID: 'static> {
    type Iter: Iterator<Item = ID>;

    /// Check if a series of ID constitute a quorum that is defined by this
    /// quorum set.
    fn is_quorum<'a, I: Iterator<Item = &'a ID> + Clone>(&self, ids: I)
        -> bool;

    /// Returns all ids in this QuorumSet.
    fn ids(&self) -> Self::Iter;

    /// The greatest value that a quorum has reached or exceeded.
    ///
    /// `value_of` returns the value reported by every id, e.g., the matching
    /// log index of a follower.
    fn quorum_accepted<V, F>(&self, value_of: F) -> V
    where
        V: Ord + Copy + Default,
        F: Fn(&ID) -> V,
    {
        let mut values = self.ids().map(|id| value_of(&id)).collect::<Vec<_>>();
        if values.is_empty() {
            return V::default();
        }

        values.sort_unstable_by(|a, b| b.cmp(a));
        values[values.len() / 2]
    }
}
