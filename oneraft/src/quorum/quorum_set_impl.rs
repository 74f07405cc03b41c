use std::collections::BTreeSet;

use crate::quorum::quorum_set::QuorumSet;

/// Every majority of the members is a quorum.
impl<ID> QuorumSet<ID> for BTreeSet<ID>
where ID: PartialOrd + Ord + Clone + 'static
{
    type Iter = std::collections::btree_set::IntoIter<ID>;

    fn is_quorum<'a, I: Iterator<Item = &'a ID> + Clone>(
        &self,
        ids: I,
    ) -> bool {
        // Duplicated ids count once.
        let present = ids.filter(|id| self.contains(id)).collect::<BTreeSet<_>>();
        present.len() * 2 > self.len()
    }

    fn ids(&self) -> Self::Iter {
        self.clone().into_iter()
    }
}
