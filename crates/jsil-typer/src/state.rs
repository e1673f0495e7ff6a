//! The variable-map state stack.
//!
//! Variable types are tracked per conditionally-executed block. The stack is
//! a sequence of *levels*; each level is the list of sibling branches of one
//! conditional construct (if/else arms, switch cases, a loop body and its
//! implicit zero-iterations sibling, a subroutine body and its never-called
//! sibling). The innermost level's most recent frame is the *active frame*;
//! the level below contributes the *parent frame*; a separate *overall*
//! cache always holds the effective type of every variable at the current
//! program point.
//!
//! Frames record only the variables modified within their scope. When a
//! variable is first modified in a scope, its previous value is written into
//! the parent frame (`⊥` when the variable did not exist there), so scope
//! exit can merge exactly the touched variables: the union over all sibling
//! values, joined with the parent's value when not every sibling touched the
//! variable. Variables whose parent entry is `⊥` were defined only inside
//! the child scope and never merge outward.

use jsil_ir::Variable;
use jsil_types::Type;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// One conditionally-executed block's bindings plus its subroutine
/// bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    types: FxHashMap<Variable, Type>,
    is_subroutine: bool,
    return_value_type: Type,
    has_returned: bool,
    is_default_switch_case: bool,
}

impl Frame {
    fn plain(is_default_switch_case: bool) -> Self {
        Self {
            types: FxHashMap::default(),
            is_subroutine: false,
            return_value_type: Type::NOTHING,
            has_returned: false,
            is_default_switch_case,
        }
    }

    fn subroutine() -> Self {
        Self {
            is_subroutine: true,
            ..Self::plain(false)
        }
    }
}

#[derive(Debug)]
pub(crate) struct StateStack {
    levels: Vec<Vec<Frame>>,
    overall: FxHashMap<Variable, Type>,
    type_changes: Vec<(Variable, Type)>,
}

impl StateStack {
    pub(crate) fn new() -> Self {
        Self {
            levels: vec![vec![Frame::plain(false)]],
            overall: FxHashMap::default(),
            type_changes: Vec::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of open levels, including the root.
    pub(crate) fn depth(&self) -> usize {
        self.levels.len()
    }

    /// The effective type of `v`, `⊤` when unknown.
    pub(crate) fn type_of(&self, v: Variable) -> Type {
        self.overall.get(&v).cloned().unwrap_or(Type::ANYTHING)
    }

    pub(crate) fn knows(&self, v: Variable) -> bool {
        self.overall.contains_key(&v)
    }

    /// Drains the accumulated type-change events, in occurrence order.
    pub(crate) fn take_type_changes(&mut self) -> Vec<(Variable, Type)> {
        std::mem::take(&mut self.type_changes)
    }

    // =========================================================================
    // Type updates
    // =========================================================================

    /// Writes `v -> t` into the active frame and the overall cache. The
    /// parent frame is initialized with the previous overall value (`⊥` for
    /// variables fresh in this scope) on first touch.
    pub(crate) fn update_type(&mut self, v: Variable, t: Type) {
        let active_level = self.active_level_index();
        if active_level > 0 {
            let fallback = self.overall.get(&v).cloned().unwrap_or(Type::NOTHING);
            let (below, at) = self.levels.split_at_mut(active_level);
            let parent = below[active_level - 1]
                .last_mut()
                .expect("parent level has no frame");
            parent.types.entry(v).or_insert(fallback);
            let active = at[0].last_mut().expect("active level has no frame");
            active.types.insert(v, t.clone());
        } else {
            // Root scope: the active frame is its own parent.
            self.levels[0]
                .last_mut()
                .expect("root frame")
                .types
                .insert(v, t.clone());
        }
        self.record_overall(v, t);
    }

    /// Unions `t` into the nearest enclosing subroutine frame's running
    /// return-value type and marks the active frame as having returned.
    /// Updates after a return on the same path are dead code and ignored.
    pub(crate) fn update_return_value_type(&mut self, t: Type) {
        let active_level = self.active_level_index();
        if self.levels[active_level]
            .last()
            .expect("active frame")
            .has_returned
        {
            return;
        }
        let sub_level = (0..=active_level)
            .rev()
            .find(|&i| {
                self.levels[i]
                    .last()
                    .is_some_and(|f| f.is_subroutine)
            })
            .expect("return-value update outside any subroutine");
        let sub = self.levels[sub_level].last_mut().expect("subroutine frame");
        sub.return_value_type = sub.return_value_type.union_with(&t);
        self.levels[active_level]
            .last_mut()
            .expect("active frame")
            .has_returned = true;
    }

    // =========================================================================
    // Scope transitions
    // =========================================================================

    /// Opens a new group of sibling conditional blocks.
    pub(crate) fn start_group_of_conditional_blocks(&mut self) {
        self.levels.push(Vec::new());
    }

    /// Opens the next sibling block of the innermost group. Any variable the
    /// just-finished sibling modified is replayed back to its parent value
    /// in the overall cache, with reverse type-change events.
    pub(crate) fn enter_conditional_block(&mut self, is_default_switch_case: bool) {
        assert!(
            self.levels.len() >= 2,
            "enterConditionalBlock without an open group"
        );
        let top = self.levels.len() - 1;
        let Self {
            levels,
            overall,
            type_changes,
        } = self;
        let (below, top_slice) = levels.split_at_mut(top);
        let top_level = &mut top_slice[0];
        assert!(
            top_level.iter().all(|f| !f.is_subroutine),
            "cannot add a conditional sibling to a subroutine level"
        );
        if let Some(prev) = top_level.last() {
            let parent = below[top - 1].last().expect("parent level has no frame");
            for v in prev.types.keys() {
                let pv = parent
                    .types
                    .get(v)
                    .expect("parent entry missing for sibling-modified variable");
                if !pv.is_nothing() && overall.get(v) != Some(pv) {
                    overall.insert(*v, pv.clone());
                    type_changes.push((*v, pv.clone()));
                    tracing::trace!(variable = %v, new_type = %pv, "type reverted at sibling boundary");
                }
            }
        }
        top_level.push(Frame::plain(is_default_switch_case));
    }

    /// Closes the innermost group, merging every sibling's bindings into the
    /// re-activated parent frame.
    pub(crate) fn end_group_of_conditional_blocks(&mut self) {
        assert!(
            self.levels.len() >= 2,
            "endGroupOfConditionalBlocks without an open group"
        );
        let siblings = self.levels.pop().expect("checked above");
        self.merge_states(siblings);
    }

    /// Whether any sibling of the innermost group is a switch default case.
    pub(crate) fn top_level_has_default_case(&self) -> bool {
        self.levels
            .last()
            .is_some_and(|level| level.iter().any(|f| f.is_default_switch_case))
    }

    /// Opens a subroutine body: a level holding an empty "never called"
    /// sibling and the active subroutine frame. This is what makes function
    /// bodies conditionally-executed code with respect to the outer scope.
    pub(crate) fn start_subroutine(&mut self) {
        self.levels.push(vec![Frame::plain(false), Frame::subroutine()]);
    }

    /// Closes a subroutine body and computes its return-value type: the
    /// union of every sibling's running return type, joined with
    /// `default_return` when the body did not return on its main path.
    pub(crate) fn end_subroutine(&mut self, default_return: Type) -> Type {
        assert!(self.levels.len() >= 2, "endSubroutine without an open subroutine");
        let siblings = self.levels.pop().expect("checked above");
        let sub = siblings
            .iter()
            .find(|f| f.is_subroutine)
            .expect("endSubroutine on a non-subroutine level");
        let mut rvt = Type::NOTHING;
        for f in &siblings {
            rvt = rvt.union_with(&f.return_value_type);
        }
        if !sub.has_returned {
            rvt = rvt.union_with(&default_return);
        }
        self.merge_states(siblings);
        rvt
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Index of the level containing the active frame. The top level is
    /// empty only between a group start and its first entered block; the
    /// active frame is then still the one below.
    fn active_level_index(&self) -> usize {
        let top = self.levels.len() - 1;
        if self.levels[top].is_empty() {
            assert!(top > 0, "root level must hold a frame");
            top - 1
        } else {
            top
        }
    }

    fn record_overall(&mut self, v: Variable, t: Type) {
        // `⊥` never reaches the overall cache; it would be observable as a
        // hole where consumers are promised a real type.
        if t.is_nothing() {
            return;
        }
        if self.overall.get(&v) != Some(&t) {
            tracing::trace!(variable = %v, new_type = %t, "type changed");
            self.overall.insert(v, t.clone());
            self.type_changes.push((v, t));
        }
    }

    fn merge_states(&mut self, siblings: Vec<Frame>) {
        if siblings.is_empty() {
            return;
        }
        let num_siblings = siblings.len();
        let all_returned = siblings.iter().all(|f| f.has_returned);

        // Union per touched variable, counting how many siblings touched it.
        // BTreeMap keeps the emitted events deterministic.
        let mut merged: BTreeMap<Variable, (Type, usize)> = BTreeMap::new();
        for f in &siblings {
            for (v, t) in &f.types {
                let entry = merged.entry(*v).or_insert((Type::NOTHING, 0));
                entry.0 = entry.0.union_with(t);
                entry.1 += 1;
            }
        }

        let parent_level = self.active_level_index();
        let parent = self.levels[parent_level]
            .last_mut()
            .expect("no active frame to merge into");
        let mut overall_updates = Vec::new();
        for (v, (t, count)) in merged {
            // No parent entry (or `⊥`): the variable was defined only inside
            // the popped scope and is not visible here.
            let Some(parent_type) = parent.types.get(&v).cloned() else {
                continue;
            };
            if parent_type.is_nothing() {
                continue;
            }
            let new_type = if count < num_siblings {
                t.union_with(&parent_type)
            } else {
                t
            };
            if new_type.is_nothing() {
                continue;
            }
            parent.types.insert(v, new_type.clone());
            overall_updates.push((v, new_type));
        }
        if all_returned {
            parent.has_returned = true;
        }
        for (v, t) in overall_updates {
            self.record_overall(v, t);
        }
    }
}
