//! Label raster to polygon conversion.
//!
//! Every connected region of one non-zero label becomes one or more polygons
//! tagged with that label. Region outlines follow pixel edges, so the result is
//! exact at the raster's resolution; runs of collinear edges are merged into
//! single segments. Rings never pass through a vertex twice: where a region
//! touches itself at a single corner the outline is split there, so shells that
//! meet diagonally come out as separate polygons and holes touching the shell
//! become interior rings.

use std::collections::{HashMap, VecDeque};

use agriboundary_core::models::{
    BoundaryPolygon, BoundarySet, Connectivity, LabelRaster, NO_LABEL,
};
use geo::{Coord, LineString, Polygon};
use tracing::debug;

type Vertex = (i64, i64);
type Edge = (Vertex, Vertex);

/// Vectorize with 4-connected regions
pub fn vectorize(labels: &LabelRaster) -> BoundarySet {
    vectorize_with(labels, Connectivity::Four)
}

/// Vectorize with an explicit region connectivity
pub fn vectorize_with(labels: &LabelRaster, connectivity: Connectivity) -> BoundarySet {
    let grid = &labels.grid;
    let (components, tags) = label_components(labels, connectivity);
    let buckets = boundary_edges(labels, &components, tags.len());
    let mut polygons = Vec::with_capacity(tags.len());

    for (edges, &tag) in buckets.iter().zip(&tags) {
        let rings = chain_rings(edges)
            .into_iter()
            .flat_map(split_at_repeats)
            .filter(|r| r.len() >= 4)
            .map(simplify)
            .collect();

        for (exterior, holes) in assemble(rings) {
            let exterior = to_world(labels, &exterior);
            let holes = holes.iter().map(|r| to_world(labels, r)).collect();
            polygons.push(BoundaryPolygon::new(Polygon::new(exterior, holes), Some(tag)));
        }
    }

    debug!(regions = tags.len(), polygons = polygons.len(), "Vectorized label raster");
    BoundarySet::new(polygons, grid.crs.clone())
}

/// Connected regions of equal non-zero label.
///
/// Returns per-pixel region ids (0 = none, region `n` at index `n - 1` of the
/// returned labels) in raster scan order.
fn label_components(labels: &LabelRaster, connectivity: Connectivity) -> (Vec<u32>, Vec<u32>) {
    let grid = &labels.grid;
    let mut components = vec![0u32; grid.len()];
    let mut tags = Vec::new();
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for start in 0..grid.len() {
        let label = labels.labels[start];
        if label == NO_LABEL || components[start] != 0 {
            continue;
        }
        next += 1;
        tags.push(label);
        components[start] = next;
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            let (col, row) = ((idx % grid.width) as isize, (idx / grid.width) as isize);
            for (dc, dr) in connectivity.offsets() {
                let (c, r) = (col + dc, row + dr);
                if c < 0 || r < 0 || c >= grid.width as isize || r >= grid.height as isize {
                    continue;
                }
                let n = grid.index(c as usize, r as usize);
                if components[n] == 0 && labels.labels[n] == label {
                    components[n] = next;
                    queue.push_back(n);
                }
            }
        }
    }

    (components, tags)
}


/// Directed pixel edges separating each region from everything else, bucketed
/// by region in one pass over the grid.
///
/// Corners use column/row coordinates with rows growing downwards; edges run
/// clockwise around each pixel, keeping the region on their right.
fn boundary_edges(labels: &LabelRaster, components: &[u32], count: usize) -> Vec<Vec<Edge>> {
    let grid = &labels.grid;
    let component_at = |c: i64, r: i64| {
        if c < 0 || r < 0 || c as usize >= grid.width || r as usize >= grid.height {
            0
        } else {
            components[grid.index(c as usize, r as usize)]
        }
    };

    let mut buckets = vec![Vec::new(); count];
    for row in 0..grid.height as i64 {
        for col in 0..grid.width as i64 {
            let component = component_at(col, row);
            if component == 0 {
                continue;
            }
            let edges = &mut buckets[component as usize - 1];
            if component_at(col, row - 1) != component {
                edges.push(((col, row), (col + 1, row)));
            }
            if component_at(col + 1, row) != component {
                edges.push(((col + 1, row), (col + 1, row + 1)));
            }
            if component_at(col, row + 1) != component {
                edges.push(((col + 1, row + 1), (col, row + 1)));
            }
            if component_at(col - 1, row) != component {
                edges.push(((col, row + 1), (col, row)));
            }
        }
    }
    buckets
}

fn direction(from: Vertex, to: Vertex) -> Vertex {
    ((to.0 - from.0).signum(), (to.1 - from.1).signum())
}

/// Rank of a turn from `incoming` to `outgoing`; lower is preferred.
///
/// Where two diagonal pixels of a region meet at a corner the tracer keeps
/// hugging the current pixel (turn right).
fn turn_rank(incoming: Vertex, outgoing: Vertex) -> u8 {
    let right = (-incoming.1, incoming.0);
    let left = (incoming.1, -incoming.0);
    [right, incoming, left]
        .iter()
        .position(|d| *d == outgoing)
        .unwrap_or(3) as u8
}

/// Chain edges into closed loops of corner vertices (without the closing repeat)
fn chain_rings(edges: &[Edge]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut ring = vec![edges[start].0];
        let mut current = start;

        loop {
            let (from, to) = edges[current];
            let incoming = direction(from, to);
            let next = outgoing.get(&to).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&e| !used[e] || e == start)
                    .min_by_key(|&e| turn_rank(incoming, direction(edges[e].0, edges[e].1)))
            });

            match next {
                Some(e) if e == start => break,
                Some(e) => {
                    used[e] = true;
                    ring.push(to);
                    current = e;
                }
                None => break,
            }
        }

        rings.push(ring);
    }

    rings
}

/// Cut a closed loop into simple loops wherever it revisits a vertex
fn split_at_repeats(ring: Vec<Vertex>) -> Vec<Vec<Vertex>> {
    let mut loops = Vec::new();
    let mut stack: Vec<Vertex> = Vec::with_capacity(ring.len());
    let mut seen: HashMap<Vertex, usize> = HashMap::with_capacity(ring.len());

    for vertex in ring {
        match seen.get(&vertex) {
            Some(&at) => {
                let tail = stack.split_off(at + 1);
                for v in &tail {
                    seen.remove(v);
                }
                let mut closed = Vec::with_capacity(tail.len() + 1);
                closed.push(vertex);
                closed.extend(tail);
                loops.push(closed);
            }
            None => {
                seen.insert(vertex, stack.len());
                stack.push(vertex);
            }
        }
    }
    loops.push(stack);
    loops
}

/// Drop vertices lying on a straight run
fn simplify(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            direction(prev, ring[i]) != direction(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed area in corner space; positive for shells, negative for holes
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum()
}

/// Crossing-number test for a point that never lies on a pixel edge
fn ring_contains(ring: &[Vertex], x: f64, y: f64) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        let (ax, ay, bx, by) = (a.0 as f64, a.1 as f64, b.0 as f64, b.1 as f64);
        if (ay > y) != (by > y) && x < ax + (y - ay) * (bx - ax) / (by - ay) {
            inside = !inside;
        }
    }
    inside
}

/// Centre of the region pixel on the right of a hole's first edge
fn sample_point(hole: &[Vertex]) -> (f64, f64) {
    let from = hole[0];
    let (dx, dy) = direction(from, hole[1]);
    let to = (from.0 + dx, from.1 + dy);
    let col = from.0.min(to.0) - i64::from(dy > 0);
    let row = from.1.min(to.1) - i64::from(dx < 0);
    (col as f64 + 0.5, row as f64 + 0.5)
}

/// Group simple loops into (shell, holes); each hole goes to the smallest shell around it
fn assemble(rings: Vec<Vec<Vertex>>) -> Vec<(Vec<Vertex>, Vec<Vec<Vertex>>)> {
    let (mut shells, holes): (Vec<_>, Vec<_>) =
        rings.into_iter().partition(|r| signed_area2(r) > 0);
    if shells.is_empty() {
        return Vec::new();
    }
    shells.sort_by_key(|r| std::cmp::Reverse(signed_area2(r)));

    let mut polygons: Vec<_> = shells.into_iter().map(|r| (r, Vec::new())).collect();
    if polygons.len() == 1 {
        polygons[0].1 = holes;
        return polygons;
    }

    for hole in holes {
        let (x, y) = sample_point(&hole);
        let owner = polygons
            .iter()
            .rposition(|(shell, _)| ring_contains(shell, x, y))
            .unwrap_or(0);
        polygons[owner].1.push(hole);
    }
    polygons
}

/// Map corner vertices through the grid transform, wound counter-clockwise in world space
fn to_world(labels: &LabelRaster, ring: &[Vertex]) -> LineString<f64> {
    let grid = &labels.grid;
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .rev()
        .map(|&(c, r)| grid.corner(c as usize, r as usize))
        .collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::from(coords)
}
