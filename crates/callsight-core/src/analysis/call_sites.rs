use crate::function::{CallSites, Function};
use crate::operations::{Callee, UnresolvedEdge};

/// Refills the internal, library and high-level call lists from the lowered body.
///
/// Modifier and base-constructor lists come from the declaration header and are kept as they are.
/// Functions without a body keep whatever lists their front end recorded.
pub fn collect_call_sites(function: &mut Function) {
    let Some(body) = &function.body else {
        return;
    };
    let mut internal = Vec::new();
    let mut library = Vec::new();
    let mut high_level = Vec::new();

    for callee in body.operations().filter_map(|op| op.callee()) {
        let list = match callee {
            Callee::Internal(_)
            | Callee::Builtin(_)
            | Callee::Unresolved {
                edge: UnresolvedEdge::Internal,
                ..
            } => &mut internal,
            Callee::Library(_)
            | Callee::Unresolved {
                edge: UnresolvedEdge::Library,
                ..
            } => &mut library,
            Callee::HighLevel { .. } => &mut high_level,
            Callee::Intrinsic(_) => continue,
        };
        if !list.contains(callee) {
            list.push(callee.clone());
        }
    }

    function.calls = CallSites {
        modifiers: std::mem::take(&mut function.calls.modifiers),
        base_constructors: std::mem::take(&mut function.calls.base_constructors),
        internal,
        library,
        high_level,
    };
}
