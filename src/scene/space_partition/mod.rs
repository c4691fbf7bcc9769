mod clip;

pub use clip::{
    AxisPlane, DegenerateTriangle, PhantomTriangle, Side, SplitOutcome, TriangleRef,
};

use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::{
    geometry::{Axis, FloatType, Ray, ShapeId, WorldBox, WorldPoint},
    util::Stats,
};

/// Boundary tolerance of the whole-containment test used when moving items
/// into child nodes.
const CONTAINMENT_EPSILON: FloatType = 1e-4;

/// Per-tree tuning options.
#[derive(Copy, Clone, Debug)]
pub struct PartitionConfig {
    /// A node splits only once its item count exceeds this.
    pub max_items: usize,
    /// Hard recursion ceiling, prevents runaway subdivision.
    pub max_depth: u32,
    /// Clip triangles at split boundaries instead of retaining straddlers.
    /// Must stay off for trees holding whole shapes.
    pub splitting: bool,
    /// Two-way kd divisions along the longest axis instead of eight octants.
    pub kd_divisions: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            max_items: 10,
            max_depth: 8,
            splitting: false,
            kd_divisions: false,
        }
    }
}

/// Items a space partition can hold: anything with a bounding box, optionally
/// clippable against a dividing plane.
pub trait PartitionItem: Clone {
    fn bounding_box(&self) -> WorldBox;

    /// `None` for item kinds that cannot be cut (whole shapes).
    fn clip(&self, plane: &AxisPlane) -> Option<SplitOutcome<Self>>
    where
        Self: Sized;
}

/// A whole shape registered in a partition by its bounding box.
#[derive(Clone, Debug)]
pub struct ShapeItem {
    pub id: ShapeId,
    pub bounds: WorldBox,
}

impl PartitionItem for ShapeItem {
    fn bounding_box(&self) -> WorldBox {
        self.bounds.clone()
    }

    fn clip(&self, _plane: &AxisPlane) -> Option<SplitOutcome<ShapeItem>> {
        None
    }
}

impl PartitionItem for PhantomTriangle {
    fn bounding_box(&self) -> WorldBox {
        self.triangle().bounding_box()
    }

    fn clip(&self, plane: &AxisPlane) -> Option<SplitOutcome<PhantomTriangle>> {
        Some(self.split_at_plane(plane))
    }
}

/// One axis-aligned cell of the tree. Items live in leaves, except for
/// straddlers that could not be moved or cut down.
#[derive(Clone, Debug)]
pub struct PartitionNode<T> {
    pub bounds: WorldBox,
    pub items: Vec<T>,
    pub children: Vec<PartitionNode<T>>,
}

impl<T> PartitionNode<T> {
    fn new(bounds: WorldBox) -> PartitionNode<T> {
        PartitionNode {
            bounds,
            items: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Adaptive octree / kd-tree over bounded items.
///
/// Built once per scene-geometry change: `add` everything, then `split`.
/// There is no incremental update, a stale tree is discarded wholesale.
#[derive(Clone, Debug)]
pub struct SpacePartition<T> {
    root: PartitionNode<T>,
    config: PartitionConfig,
}

impl<T: PartitionItem> SpacePartition<T> {
    pub fn new(bounds: WorldBox, config: PartitionConfig) -> SpacePartition<T> {
        SpacePartition {
            root: PartitionNode::new(bounds),
            config,
        }
    }

    /// Builds a tree enclosing all items and splits it immediately.
    pub fn from_items(
        items: impl IntoIterator<Item = T>,
        config: PartitionConfig,
    ) -> SpacePartition<T> {
        let items: Vec<T> = items.into_iter().collect();
        let bounds = items
            .iter()
            .map(|i| i.bounding_box())
            .reduce(|a, b| a.merged(&b))
            .unwrap_or_else(|| WorldBox::new(WorldPoint::origin(), WorldPoint::origin()))
            .grown(CONTAINMENT_EPSILON);

        let mut partition = SpacePartition::new(bounds, config);
        for item in items {
            partition.add(item);
        }
        partition.split();
        partition
    }

    pub fn root(&self) -> &PartitionNode<T> {
        &self.root
    }

    /// Registers an item in the root. Constant time, all subdivision is
    /// deferred to `split`.
    pub fn add(&mut self, item: T) {
        self.root.items.push(item);
    }

    /// Recursively subdivides nodes that are over the item threshold.
    pub fn split(&mut self) {
        split_node(&mut self.root, &self.config, 0);
    }

    /// Every node holding items whose box the ray's segment passes through,
    /// ordered by entry distance. Candidate items inside still have to be
    /// tested individually by the caller.
    pub fn nodes_on_ray(&self, ray: &Ray) -> Vec<&PartitionNode<T>> {
        let mut found: Vec<(FloatType, &PartitionNode<T>)> = Vec::new();
        collect_ray_nodes(&self.root, ray, &mut found);
        found.sort_by_key(|(t, _)| OrderedFloat(*t));
        found.into_iter().map(|(_, node)| node).collect()
    }

    /// Point-location query: every item-holding node whose box contains the
    /// point.
    pub fn nodes_at_point(&self, point: &WorldPoint) -> Vec<&PartitionNode<T>> {
        let mut found = Vec::new();
        collect_point_nodes(&self.root, point, &mut found);
        found
    }

    pub fn iter_items(&self) -> impl Iterator<Item = &T> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter());
            Some(node)
        })
        .flat_map(|node| node.items.iter())
    }

    pub fn depth_statistics(&self) -> Stats {
        depth_statistics(&self.root)
    }

    pub fn leaf_fill_statistics(&self) -> Stats {
        let mut stats = Stats::default();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                stats.add_sample(node.items.len());
            }
            stack.extend(node.children.iter());
        }
        stats
    }
}

fn split_node<T: PartitionItem>(node: &mut PartitionNode<T>, config: &PartitionConfig, depth: u32) {
    if depth >= config.max_depth || node.items.len() <= config.max_items {
        return;
    }

    let (child_boxes, planes) = divisions(&node.bounds, config);
    let mut children: Vec<PartitionNode<T>> =
        child_boxes.into_iter().map(PartitionNode::new).collect();

    let mut retained = Vec::new();
    for item in node.items.drain(..) {
        place_item(item, &mut children, &planes, config, &mut retained);
    }
    node.items = retained;

    for child in children.iter_mut() {
        split_node(child, config, depth + 1);
    }
    // Empty children are dropped so that leaf queries stay cheap
    node.children = children
        .into_iter()
        .filter(|c| !c.items.is_empty() || !c.children.is_empty())
        .collect();
}

/// Candidate child boxes of a node and the planes dividing them.
fn divisions(bounds: &WorldBox, config: &PartitionConfig) -> (Vec<WorldBox>, Vec<AxisPlane>) {
    let center = bounds.center();
    if config.kd_divisions {
        let axis = bounds.longest_axis();
        let plane = AxisPlane {
            axis,
            offset: center[axis.index()],
        };
        (bounds.halves(axis).to_vec(), vec![plane])
    } else {
        let planes = Axis::ALL
            .iter()
            .map(|&axis| AxisPlane {
                axis,
                offset: center[axis.index()],
            })
            .collect();
        (bounds.octants().to_vec(), planes)
    }
}

/// Moves an item into the single child that wholly contains it, clipping
/// triangles at the dividing planes when enabled. Items that fit nowhere stay
/// in the parent; they are never dropped.
fn place_item<T: PartitionItem>(
    item: T,
    children: &mut [PartitionNode<T>],
    planes: &[AxisPlane],
    config: &PartitionConfig,
    retained: &mut Vec<T>,
) {
    let bounds = item.bounding_box();
    if let Some(child) = children
        .iter_mut()
        .find(|c| c.bounds.contains_almost(&bounds, CONTAINMENT_EPSILON))
    {
        child.items.push(item);
        return;
    }

    if !config.splitting {
        retained.push(item);
        return;
    }

    match clip_through_planes(item.clone(), planes) {
        Ok(fragments) => {
            for fragment in fragments {
                let bounds = fragment.bounding_box();
                match children
                    .iter_mut()
                    .find(|c| c.bounds.contains_almost(&bounds, CONTAINMENT_EPSILON))
                {
                    Some(child) => child.items.push(fragment),
                    None => {
                        // Should not happen after clipping against every
                        // dividing plane, but floating point may disagree.
                        debug!("clipped fragment still straddles, retaining in parent");
                        retained.push(fragment);
                    }
                }
            }
        }
        Err(refusal) => {
            match refusal {
                ClipRefused::Unsplittable => {
                    debug!("straddling item cannot be clipped, retaining in parent")
                }
                ClipRefused::Degenerate(err) => {
                    warn!("refusing triangle split, keeping original: {err}")
                }
            }
            retained.push(item);
        }
    }
}

enum ClipRefused {
    Unsplittable,
    Degenerate(DegenerateTriangle),
}

/// Cuts an item through every dividing plane in turn, accumulating fragments.
/// Any degenerate cut refuses the whole attempt so the caller can keep the
/// original item intact.
fn clip_through_planes<T: PartitionItem>(item: T, planes: &[AxisPlane]) -> Result<Vec<T>, ClipRefused> {
    let mut fragments = vec![item];

    for plane in planes {
        let mut next = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment.clip(plane) {
                None => return Err(ClipRefused::Unsplittable),
                Some(SplitOutcome::Unsplit(_)) | Some(SplitOutcome::Coplanar) => {
                    next.push(fragment)
                }
                Some(SplitOutcome::Degenerate(err)) => {
                    return Err(ClipRefused::Degenerate(err));
                }
                Some(SplitOutcome::Split { negative, positive }) => {
                    next.extend(negative);
                    next.extend(positive);
                }
            }
        }
        fragments = next;
    }

    Ok(fragments)
}

fn collect_ray_nodes<'a, T>(
    node: &'a PartitionNode<T>,
    ray: &Ray,
    found: &mut Vec<(FloatType, &'a PartitionNode<T>)>,
) {
    let Some((t_enter, _)) = node.bounds.intersect_ray(ray) else {
        return;
    };
    if !node.items.is_empty() {
        found.push((t_enter.max(0.0), node));
    }
    for child in &node.children {
        collect_ray_nodes(child, ray, found);
    }
}

fn collect_point_nodes<'a, T>(
    node: &'a PartitionNode<T>,
    point: &WorldPoint,
    found: &mut Vec<&'a PartitionNode<T>>,
) {
    if !node.bounds.contains_point_almost(point, CONTAINMENT_EPSILON) {
        return;
    }
    if !node.items.is_empty() {
        found.push(node);
    }
    for child in &node.children {
        collect_point_nodes(child, point, found);
    }
}

pub(crate) fn depth_statistics<T>(node: &PartitionNode<T>) -> Stats {
    if node.is_leaf() {
        return Stats::new_single(1);
    }

    let mut ret = node
        .children
        .iter()
        .map(depth_statistics)
        .reduce(|a, b| a.merge(&b))
        .unwrap_or_else(|| Stats::new_single(0));

    ret.min += 1;
    ret.max += 1;
    ret.avg += 1.0;

    ret
}
