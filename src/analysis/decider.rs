use crate::error::Error;
use crate::store::{HashGroup, HashIndex};
use std::path::{Path, PathBuf};

/// Keep/delete split over every digest group of an index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decision {
    pub keep: Vec<PathBuf>,
    pub delete: Vec<PathBuf>,
    pub groups: usize,
    /// Groups with more than one member.
    pub duplicate_groups: usize,
}

/// Paths compare and match prefixes byte-wise, not component-wise.
fn path_bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}

pub fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| path_bytes(a).cmp(path_bytes(b)));
}

/// Split one group into `(keep, delete)`.
///
/// Members are sorted, then every member starting with a prefix is marked for
/// deletion, prefix by prefix in the given order. A member matched by several
/// prefixes is listed once. If that marks the whole group, the last marked
/// member is kept instead.
pub fn split_group(
    mut members: Vec<PathBuf>,
    prefixes: &[PathBuf],
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    if members.len() < 2 {
        return (members, Vec::new());
    }
    sort_paths(&mut members);

    let mut marked = vec![false; members.len()];
    let mut delete_order: Vec<usize> = Vec::new();
    for prefix in prefixes {
        let prefix = path_bytes(prefix);
        for (i, member) in members.iter().enumerate() {
            if !marked[i] && path_bytes(member).starts_with(prefix) {
                marked[i] = true;
                delete_order.push(i);
            }
        }
    }

    if delete_order.len() == members.len() {
        if let Some(survivor) = delete_order.pop() {
            marked[survivor] = false;
        }
    }

    let mut slots: Vec<Option<PathBuf>> = members.into_iter().map(Some).collect();
    let delete: Vec<PathBuf> = delete_order.iter().filter_map(|&i| slots[i].take()).collect();
    let keep: Vec<PathBuf> = slots.into_iter().flatten().collect();
    (keep, delete)
}

pub fn decide<I>(groups: I, prefixes: &[PathBuf]) -> Decision
where
    I: IntoIterator<Item = HashGroup>,
{
    let mut decision = Decision::default();
    for group in groups {
        decision.groups += 1;
        if group.paths.len() > 1 {
            decision.duplicate_groups += 1;
        }
        let (keep, delete) = split_group(group.paths, prefixes);
        decision.keep.extend(keep);
        decision.delete.extend(delete);
    }
    decision
}

/// [`decide`] over every group stored in `index`.
pub fn decide_index(index: &HashIndex, prefixes: &[PathBuf]) -> Result<Decision, Error> {
    let groups = index.groups().collect::<Result<Vec<_>, _>>()?;
    Ok(decide(groups, prefixes))
}
