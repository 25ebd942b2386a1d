//! Layered level hierarchy and its flattening into virtual levels.

use super::domain_level::{DomainLayer, DomainLevel};
use crate::algs::communicator::Communicator;
use std::collections::VecDeque;
use std::sync::Arc;

/// One entry of the flattened hierarchy.
///
/// A virtual level on the coarsest level of a child layer is a child level;
/// when the rank also belongs to the next layer it is a parent level too and
/// carries that layer's finest level, which covers the same region as the
/// union of its siblings' patches.
pub struct VirtualLevel<C: Communicator> {
    level: Arc<DomainLevel>,
    layer: Arc<DomainLayer<C>>,
    parent: Option<(Arc<DomainLevel>, Arc<DomainLayer<C>>)>,
    is_child: bool,
}

impl<C: Communicator> VirtualLevel<C> {
    pub fn level(&self) -> &DomainLevel {
        &self.level
    }

    pub fn layer(&self) -> &DomainLayer<C> {
        &self.layer
    }

    pub fn level_index(&self) -> usize {
        self.level.level_index()
    }

    pub fn is_child(&self) -> bool {
        self.is_child
    }

    pub fn is_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn level_p(&self) -> Option<&DomainLevel> {
        self.parent.as_ref().map(|(l, _)| &**l)
    }

    pub fn layer_p(&self) -> Option<&DomainLayer<C>> {
        self.parent.as_ref().map(|(_, l)| &**l)
    }
}

/// Layers (finest communicator first) with their level deques (finest level
/// first) and the virtual level list built from them.
pub struct DomainControl<C: Communicator> {
    comm: Arc<C>,
    layers: Vec<Arc<DomainLayer<C>>>,
    layer_levels: Vec<VecDeque<Arc<DomainLevel>>>,
    virt_levels: Vec<VirtualLevel<C>>,
}

impl<C: Communicator> DomainControl<C> {
    pub fn new(comm: Arc<C>) -> Self {
        Self {
            comm,
            layers: Vec::new(),
            layer_levels: Vec::new(),
            virt_levels: Vec::new(),
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn comm_arc(&self) -> &Arc<C> {
        &self.comm
    }

    /// Append a layer with an empty level deque.
    pub fn push_layer(&mut self, layer: DomainLayer<C>) {
        self.layers.push(Arc::new(layer));
        self.layer_levels.push(VecDeque::new());
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, i: usize) -> &DomainLayer<C> {
        &self.layers[i]
    }

    /// Mutable access to layer `i` while no virtual level shares it.
    pub fn layer_mut(&mut self, i: usize) -> Option<&mut DomainLayer<C>> {
        self.layers.get_mut(i).and_then(Arc::get_mut)
    }

    pub fn front_layer(&self) -> &DomainLayer<C> {
        match self.layers.first() {
            Some(l) => l,
            None => panic!("domain control has no layers"),
        }
    }

    pub fn layer_levels(&self, i: usize) -> &VecDeque<Arc<DomainLevel>> {
        &self.layer_levels[i]
    }

    /// Insert a new finest level into layer `i`.
    pub fn push_level_front(&mut self, i: usize, level: DomainLevel) {
        self.layer_levels[i].push_front(Arc::new(level));
    }

    /// Append a new coarsest level to layer `i`.
    pub fn push_level_back(&mut self, i: usize, level: DomainLevel) {
        self.layer_levels[i].push_back(Arc::new(level));
    }

    /// Remove the coarsest level of layer `i`.
    pub fn pop_level_back(&mut self, i: usize) -> Option<Arc<DomainLevel>> {
        self.layer_levels[i].pop_back()
    }

    /// Flatten the layers into virtual levels, finest first.
    ///
    /// The finest level of every layer but the first is not listed on its own:
    /// it is the parent side of the previous layer's coarsest level.
    pub fn compile_virtual_levels(&mut self) {
        self.virt_levels.clear();
        for (i, (layer, levels)) in self.layers.iter().zip(&self.layer_levels).enumerate() {
            let n = levels.len();
            for (k, level) in levels.iter().enumerate().skip(usize::from(i > 0)) {
                let coarsest = k + 1 == n;
                let virt = if !coarsest || !layer.is_child() {
                    VirtualLevel {
                        level: level.clone(),
                        layer: layer.clone(),
                        parent: None,
                        is_child: false,
                    }
                } else {
                    let parent = self
                        .layers
                        .get(i + 1)
                        .zip(self.layer_levels.get(i + 1).and_then(VecDeque::front))
                        .map(|(pl, lv)| (lv.clone(), pl.clone()));
                    VirtualLevel {
                        level: level.clone(),
                        layer: layer.clone(),
                        parent,
                        is_child: true,
                    }
                };
                self.virt_levels.push(virt);
            }
        }
        log::debug!(
            "rank {}: {} virtual levels over {} layers",
            self.comm.rank(),
            self.virt_levels.len(),
            self.layers.len()
        );
    }

    pub fn num_virtual_levels(&self) -> usize {
        self.virt_levels.len()
    }

    pub fn virtual_level(&self, i: usize) -> &VirtualLevel<C> {
        &self.virt_levels[i]
    }

    pub fn virtual_levels(&self) -> &[VirtualLevel<C>] {
        &self.virt_levels
    }

    /// Finest virtual level.
    pub fn front(&self) -> &VirtualLevel<C> {
        match self.virt_levels.first() {
            Some(v) => v,
            None => panic!("virtual levels not compiled"),
        }
    }

    /// Coarsest virtual level of this rank.
    pub fn back(&self) -> &VirtualLevel<C> {
        match self.virt_levels.last() {
            Some(v) => v,
            None => panic!("virtual levels not compiled"),
        }
    }

    pub fn max_level_index(&self) -> usize {
        self.front().level_index()
    }

    pub fn min_level_index(&self) -> usize {
        self.back().level_index()
    }

    /// Level indices of the virtual levels, finest first.
    pub fn level_indices(&self) -> Vec<usize> {
        self.virt_levels.iter().map(VirtualLevel::level_index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::geometry::RootMeshNode;

    fn levels(ctrl: &mut DomainControl<NoComm>, layer: usize, idx: &[usize]) {
        for &i in idx {
            ctrl.push_level_front(layer, DomainLevel::new(i, RootMeshNode::unit_square()));
        }
    }

    #[test]
    fn single_layer_lists_every_level() {
        let mut ctrl = DomainControl::new(Arc::new(NoComm));
        ctrl.push_layer(DomainLayer::new(Arc::new(NoComm), 0));
        levels(&mut ctrl, 0, &[1, 2, 3]);
        ctrl.compile_virtual_levels();
        assert_eq!(ctrl.level_indices(), vec![3, 2, 1]);
        assert_eq!((ctrl.max_level_index(), ctrl.min_level_index()), (3, 1));
        assert!(ctrl.virtual_levels().iter().all(|v| !v.is_child() && !v.is_parent()));
    }

    #[test]
    fn child_layer_pairs_with_parent_layer() {
        let mut ctrl = DomainControl::new(Arc::new(NoComm));
        let mut child = DomainLayer::new(Arc::new(NoComm), 0);
        child.set_parent(Arc::new(NoComm), 0);
        ctrl.push_layer(child);
        ctrl.push_layer(DomainLayer::new(Arc::new(NoComm), 1));
        levels(&mut ctrl, 0, &[2, 3]);
        levels(&mut ctrl, 1, &[0, 1, 2]);
        ctrl.compile_virtual_levels();
        assert_eq!(ctrl.level_indices(), vec![3, 2, 1, 0]);
        let v = ctrl.virtual_level(1);
        assert!(v.is_child() && v.is_parent());
        assert_eq!(v.level_p().unwrap().level_index(), 2);
        assert_eq!(v.layer_p().unwrap().layer_index(), 1);
    }

    #[test]
    fn child_without_parent_layer_ends_the_list() {
        let mut ctrl = DomainControl::new(Arc::new(NoComm));
        let mut child = DomainLayer::new(Arc::new(NoComm), 0);
        child.set_parent(Arc::new(NoComm), 0);
        ctrl.push_layer(child);
        levels(&mut ctrl, 0, &[2, 3]);
        ctrl.compile_virtual_levels();
        assert!(ctrl.back().is_child() && !ctrl.back().is_parent());
    }
}
