//! Tessellation of streamlines into an animated ribbon mesh.
//!
//! Every streamline segment becomes a quad of four vertices (two per endpoint, one on each side
//! of the line) and six indices. The renderer extrudes each vertex along its `extrude` vector
//! by a pixel line width and animates it using the time attributes.
use crate::config::FlowConfig;
use crate::random::DeterministicRandom;
use crate::streamline::Streamline;

/// Floats per vertex: position(2), extrude(2), side, time, total_time, speed, random_phase.
pub const FLOATS_PER_VERTEX: usize = 9;
/// Vertices emitted per segment.
pub const VERTICES_PER_SEGMENT: usize = 4;
/// Indices emitted per segment.
pub const INDICES_PER_SEGMENT: usize = 6;

/// Indexed ribbon geometry with per-vertex animation attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RibbonMesh {
    /// Interleaved vertex records, [`FLOATS_PER_VERTEX`] floats each.
    pub vertices: Vec<f32>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl RibbonMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertex records.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    /// Number of ribbon quads.
    pub fn segment_count(&self) -> usize {
        self.indices.len() / INDICES_PER_SEGMENT
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex record `i`.
    pub fn vertex(&self, i: usize) -> Option<RibbonVertex> {
        let o = i.checked_mul(FLOATS_PER_VERTEX)?;
        let r = self.vertices.get(o..o + FLOATS_PER_VERTEX)?;
        Some(RibbonVertex {
            position: [r[0], r[1]],
            extrude: [r[2], r[3]],
            side: r[4],
            time: r[5],
            total_time: r[6],
            speed: r[7],
            random_phase: r[8],
        })
    }

    /// Split into the raw vertex and index buffers.
    pub fn into_buffers(self) -> (Vec<f32>, Vec<u32>) {
        (self.vertices, self.indices)
    }
}

/// Decoded view of a single vertex record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RibbonVertex {
    pub position: [f32; 2],
    pub extrude: [f32; 2],
    pub side: f32,
    pub time: f32,
    pub total_time: f32,
    pub speed: f32,
    pub random_phase: f32,
}

/// Counters describing a built mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Streamlines consumed.
    pub streamlines: usize,
    /// Segments turned into quads.
    pub segments: usize,
    /// Segments skipped because they had zero duration or zero length.
    pub skipped_segments: usize,
}

/// Builds [`RibbonMesh`]es from streamlines.
#[derive(Clone, Debug)]
pub struct RibbonMeshBuilder {
    /// Visual scaling for per-segment speed.
    pub speed_factor: f32,
}

impl RibbonMeshBuilder {
    pub fn new(speed_factor: f32) -> Self {
        Self { speed_factor }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.speed_factor)
    }

    /// Build a mesh, drawing one random phase per streamline from `rng`.
    pub fn build(&self, streamlines: &[Streamline], rng: &mut DeterministicRandom) -> RibbonMesh {
        self.build_with_stats(streamlines, rng).0
    }

    /// Same as [`Self::build`], also returning [`MeshStats`].
    pub fn build_with_stats(
        &self,
        streamlines: &[Streamline],
        rng: &mut DeterministicRandom,
    ) -> (RibbonMesh, MeshStats) {
        let segment_estimate: usize = streamlines.iter().map(|l| l.len() - 1).sum();
        let mut mesh = RibbonMesh {
            vertices: Vec::with_capacity(
                segment_estimate * VERTICES_PER_SEGMENT * FLOATS_PER_VERTEX,
            ),
            indices: Vec::with_capacity(segment_estimate * INDICES_PER_SEGMENT),
        };
        let mut stats = MeshStats {
            streamlines: streamlines.len(),
            ..MeshStats::default()
        };
        let mut base: u32 = 0;

        for line in streamlines {
            let random_phase = rng.next_f32();
            let total_time = line.total_time();

            for pair in line.vertices().windows(2) {
                let (v0, v1) = (pair[0], pair[1]);
                let dt = v1.time - v0.time;
                let d = v1.position - v0.position;
                let l = d.length();
                if dt == 0.0 || l == 0.0 {
                    stats.skipped_segments += 1;
                    continue;
                }

                let ex = -d.y / l;
                let ey = d.x / l;
                let speed = self.speed_factor / dt;

                for (p, t) in [(v0.position, v0.time), (v1.position, v1.time)] {
                    mesh.vertices.extend_from_slice(&[
                        p.x,
                        p.y,
                        ex,
                        ey,
                        -1.0,
                        t,
                        total_time,
                        speed,
                        random_phase,
                    ]);
                    mesh.vertices.extend_from_slice(&[
                        p.x,
                        p.y,
                        -ex,
                        -ey,
                        1.0,
                        t,
                        total_time,
                        speed,
                        random_phase,
                    ]);
                }

                mesh.indices.extend_from_slice(&[
                    base,
                    base + 1,
                    base + 2,
                    base + 1,
                    base + 3,
                    base + 2,
                ]);
                base += VERTICES_PER_SEGMENT as u32;
                stats.segments += 1;
            }
        }

        (mesh, stats)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::streamline::StreamlineVertex;

    fn line(points: &[(f32, f32, f32)]) -> Streamline {
        Streamline::from_vertices(
            points
                .iter()
                .map(|&(x, y, t)| StreamlineVertex {
                    position: Vec2::new(x, y),
                    time: t,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn size_law_holds_for_a_batch() {
        let lines = vec![
            line(&[(0.0, 0.0, 0.0), (1.0, 0.0, 1.0), (2.0, 0.0, 2.0)]),
            line(&[(5.0, 5.0, 0.0)]),
            line(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.5), (0.0, 2.0, 1.0), (1.0, 2.0, 3.0)]),
        ];
        let segments: usize = lines.iter().map(|l| l.len() - 1).sum();
        let mesh = RibbonMeshBuilder::new(100.0).build(&lines, &mut DeterministicRandom::default());
        assert_eq!(mesh.vertices.len(), 9 * 4 * segments);
        assert_eq!(mesh.indices.len(), 6 * segments);
        assert_eq!(mesh.segment_count(), 5);
        assert_eq!(mesh.vertex_count(), 20);
    }

    #[test]
    fn quad_attributes_and_indices() {
        let lines = vec![line(&[(0.0, 0.0, 0.0), (2.0, 0.0, 4.0)])];
        let mut rng = DeterministicRandom::default();
        let expected_phase = DeterministicRandom::default().next_f32();
        let mesh = RibbonMeshBuilder::new(100.0).build(&lines, &mut rng);

        assert_eq!(mesh.indices, vec![0, 1, 2, 1, 3, 2]);

        let v0 = mesh.vertex(0).unwrap();
        assert_eq!(v0.position, [0.0, 0.0]);
        assert_eq!(v0.extrude, [0.0, 1.0]);
        assert_eq!(v0.side, -1.0);
        assert_eq!(v0.time, 0.0);
        assert_eq!(v0.total_time, 4.0);
        assert_eq!(v0.speed, 25.0);
        assert_eq!(v0.random_phase, expected_phase);

        let v1 = mesh.vertex(1).unwrap();
        assert_eq!(v1.extrude, [0.0, -1.0]);
        assert_eq!(v1.side, 1.0);

        let v3 = mesh.vertex(3).unwrap();
        assert_eq!(v3.position, [2.0, 0.0]);
        assert_eq!(v3.time, 4.0);
        assert!(mesh.vertex(4).is_none());
    }

    #[test]
    fn indices_offset_across_streamlines() {
        let lines = vec![
            line(&[(0.0, 0.0, 0.0), (1.0, 0.0, 1.0)]),
            line(&[(0.0, 1.0, 0.0), (1.0, 1.0, 1.0)]),
        ];
        let mesh = RibbonMeshBuilder::new(1.0).build(&lines, &mut DeterministicRandom::default());
        assert_eq!(&mesh.indices[6..], &[4, 5, 6, 5, 7, 6]);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn degenerate_segments_are_skipped() {
        let lines = vec![line(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (2.0, 0.0, 1.0),
            (2.0, 0.0, 2.0),
        ])];
        let (mesh, stats) = RibbonMeshBuilder::new(100.0)
            .build_with_stats(&lines, &mut DeterministicRandom::default());
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.skipped_segments, 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 1, 3, 2]);
        assert!(mesh.vertices.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn one_phase_per_streamline() {
        let lines = vec![
            line(&[(0.0, 0.0, 0.0)]),
            line(&[(0.0, 0.0, 0.0), (1.0, 0.0, 1.0)]),
        ];
        let mut reference = DeterministicRandom::default();
        reference.next_f32();
        let second_phase = reference.next_f32();

        let mut rng = DeterministicRandom::default();
        let mesh = RibbonMeshBuilder::new(1.0).build(&lines, &mut rng);
        assert_eq!(mesh.vertex(0).unwrap().random_phase, second_phase);
        assert_eq!(rng, reference);
    }
}
