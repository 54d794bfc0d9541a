//! Plain-text flat-format codec.
//!
//! A line-oriented, human-readable rendering of a [`FlatShard`]:
//!
//! ```text
//! FLATMESH
//! TITLE two triangles
//! DIM 2
//! NODES 4
//! 0 0
//! ...
//! BLOCK 1 tri3 2 3 fluid
//! 1 2 3
//! ...
//! SIDESET 3 1 inlet
//! 1 1
//! DIST 0 1 4 0 0
//! OWNERS 2
//! 0 0
//! END
//! ```
//!
//! Block and set names are the rest of their header line after one
//! separator, kept verbatim; a header that ends after its counts is
//! unnamed. Connectivity and set entries are 1-based on disk. Optional sections
//! (`NODEMAP`, `ELEMMAP`, `DIST` and the distribution arrays) may be omitted;
//! a shard without `DIST` reads as a serial shard. Reals are written with the
//! shortest representation that parses back to the same bits.

use crate::io::flat::{ElementBlock, FlatMesh, FlatShard, NodeSet, SideSet};
use crate::io::{FlatMeshReader, FlatMeshWriter};
use crate::mesh_error::MeshBridgeError;
use crate::topology::ids::{FlatIndex, GlobalId};
use crate::topology::ownership::{GlobalSet, ShardDistribution};
use itertools::Itertools;
use std::io::{Read, Write};
use std::str::{FromStr, Lines, SplitWhitespace};

const HEADER: &str = "FLATMESH";

/// Reader for the plain-text flat format.
#[derive(Debug, Default, Clone)]
pub struct TextFlatReader;

/// Writer for the plain-text flat format.
#[derive(Debug, Default, Clone)]
pub struct TextFlatWriter;

struct LineCursor<'a> {
    lines: std::iter::Enumerate<Lines<'a>>,
    line_no: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            line_no: 0,
        }
    }

    fn err(&self, msg: impl std::fmt::Display) -> MeshBridgeError {
        MeshBridgeError::Parse(format!("line {}: {msg}", self.line_no))
    }

    /// Next line, blank lines included.
    fn data(&mut self, what: &str) -> Result<&'a str, MeshBridgeError> {
        match self.lines.next() {
            Some((n, line)) => {
                self.line_no = n + 1;
                Ok(line)
            }
            None => Err(self.err(format!("unexpected end of input, expected {what}"))),
        }
    }

    /// Next non-blank line.
    fn header(&mut self) -> Option<&'a str> {
        for (n, line) in self.lines.by_ref() {
            self.line_no = n + 1;
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
        None
    }

    fn field<T: FromStr>(&self, parts: &mut SplitWhitespace<'_>, what: &str) -> Result<T, MeshBridgeError> {
        let token = parts
            .next()
            .ok_or_else(|| self.err(format!("missing {what}")))?;
        token
            .parse()
            .map_err(|_| self.err(format!("invalid {what} \"{token}\"")))
    }

    /// A data line holding exactly `count` values.
    fn list<T: FromStr>(&mut self, count: usize, what: &str) -> Result<Vec<T>, MeshBridgeError> {
        let line = self.data(what)?;
        let mut parts = line.split_whitespace();
        let values = (0..count)
            .map(|_| self.field(&mut parts, what))
            .collect::<Result<Vec<T>, _>>()?;
        if parts.next().is_some() {
            return Err(self.err(format!("more than {count} values in {what}")));
        }
        Ok(values)
    }

    /// A data line of 1-based row numbers.
    fn rows(&mut self, count: usize, what: &str) -> Result<Vec<FlatIndex>, MeshBridgeError> {
        self.list::<usize>(count, what)?
            .into_iter()
            .map(|r| {
                r.checked_sub(1)
                    .map(FlatIndex)
                    .ok_or_else(|| self.err(format!("{what} row 0 is not 1-based")))
            })
            .collect()
    }
}

/// The remainder of `line` after its first `fields` whitespace-separated
/// tokens and one separator, verbatim. `None` when the line ends there.
fn trailing_name(line: &str, fields: usize) -> Option<String> {
    let mut rest = line;
    for _ in 0..fields {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    let mut chars = rest.chars();
    match chars.next() {
        Some(sep) if sep.is_whitespace() => Some(chars.as_str().to_string()),
        _ => None,
    }
}

#[derive(Default)]
struct DistSections {
    header: Option<(usize, usize, usize, usize, usize)>,
    owners: Option<Vec<usize>>,
    node_globals: Option<Vec<GlobalId>>,
    elem_globals: Option<Vec<GlobalId>>,
    side_sets_global: Vec<GlobalSet>,
    node_sets_global: Vec<GlobalSet>,
}

impl DistSections {
    fn assemble(self, num_nodes: usize, num_elems: usize) -> ShardDistribution {
        let serial = ShardDistribution::serial(num_nodes, num_elems);
        let Some((rank, num_ranks, internal, boundary, external)) = self.header else {
            return ShardDistribution {
                side_sets_global: self.side_sets_global,
                node_sets_global: self.node_sets_global,
                ..serial
            };
        };
        ShardDistribution {
            rank,
            num_ranks,
            elem_owner: self.owners.unwrap_or_else(|| vec![rank; num_elems]),
            node_index_global: self.node_globals.unwrap_or(serial.node_index_global),
            elem_index_global: self.elem_globals.unwrap_or(serial.elem_index_global),
            num_internal_nodes: internal,
            num_boundary_nodes: boundary,
            num_external_nodes: external,
            side_sets_global: self.side_sets_global,
            node_sets_global: self.node_sets_global,
        }
    }
}

fn globals(raw: Vec<u64>) -> Vec<GlobalId> {
    raw.into_iter().map(GlobalId).collect()
}

fn global_sets(cur: &mut LineCursor<'_>, count: usize, what: &str) -> Result<Vec<GlobalSet>, MeshBridgeError> {
    (0..count)
        .map(|_| {
            let line = cur.data(what)?;
            let id = cur.field(&mut line.split_whitespace(), what)?;
            Ok::<_, MeshBridgeError>(GlobalSet {
                id,
                name: trailing_name(line, 1).unwrap_or_default(),
            })
        })
        .collect()
}

impl FlatMeshReader for TextFlatReader {
    fn read<R: Read>(&self, mut reader: R) -> Result<FlatShard, MeshBridgeError> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        let mut cur = LineCursor::new(&contents);

        if cur.header().map(str::trim) != Some(HEADER) {
            return Err(cur.err("missing FLATMESH header"));
        }

        let mut mesh = FlatMesh::default();
        let mut dist = DistSections::default();
        let mut saw_end = false;

        while let Some(line) = cur.header() {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            match keyword {
                "TITLE" => {
                    mesh.title = line.trim_start()["TITLE".len()..].trim().to_string();
                }
                "DIM" => {
                    mesh.dim = cur.field(&mut parts, "dimension")?;
                    if !(2..=3).contains(&mesh.dim) {
                        return Err(cur.err(format!("unsupported dimension {}", mesh.dim)));
                    }
                }
                "NODES" => {
                    if mesh.dim == 0 {
                        return Err(cur.err("NODES before DIM"));
                    }
                    let count: usize = cur.field(&mut parts, "node count")?;
                    mesh.coords = vec![Vec::with_capacity(count); mesh.dim];
                    for _ in 0..count {
                        let xyz: Vec<f64> = cur.list(mesh.dim, "node coordinates")?;
                        for (axis, value) in mesh.coords.iter_mut().zip(xyz) {
                            axis.push(value);
                        }
                    }
                }
                "BLOCK" => {
                    let id = cur.field(&mut parts, "block id")?;
                    let elem_type: String = cur.field(&mut parts, "block type")?;
                    let nelem: usize = cur.field(&mut parts, "block element count")?;
                    let npe: usize = cur.field(&mut parts, "nodes per element")?;
                    let name = trailing_name(line, 5);
                    let mut connectivity = Vec::with_capacity(nelem * npe);
                    for _ in 0..nelem {
                        connectivity.extend(cur.rows(npe, "element connectivity")?);
                    }
                    mesh.blocks.push(ElementBlock {
                        id,
                        elem_type,
                        name,
                        nodes_per_elem: npe,
                        connectivity,
                    });
                }
                "NODESET" => {
                    let id = cur.field(&mut parts, "node set id")?;
                    let count: usize = cur.field(&mut parts, "node set size")?;
                    let name = trailing_name(line, 3);
                    let nodes = cur.rows(count, "node set")?;
                    mesh.node_sets.push(NodeSet { id, name, nodes });
                }
                "SIDESET" => {
                    let id = cur.field(&mut parts, "side set id")?;
                    let count: usize = cur.field(&mut parts, "side set size")?;
                    let name = trailing_name(line, 3);
                    let mut set = SideSet {
                        id,
                        name,
                        elements: Vec::with_capacity(count),
                        sides: Vec::with_capacity(count),
                    };
                    for _ in 0..count {
                        let entry: Vec<usize> = cur.list(2, "side set entry")?;
                        let elem = entry[0]
                            .checked_sub(1)
                            .ok_or_else(|| cur.err("side set element 0 is not 1-based"))?;
                        set.elements.push(FlatIndex(elem));
                        set.sides.push(
                            i32::try_from(entry[1])
                                .map_err(|_| cur.err("side index overflows"))?,
                        );
                    }
                    mesh.side_sets.push(set);
                }
                "NODEMAP" => {
                    let count = cur.field(&mut parts, "node map size")?;
                    mesh.node_id_map = cur.list(count, "node map")?;
                }
                "ELEMMAP" => {
                    let count = cur.field(&mut parts, "element map size")?;
                    mesh.elem_id_map = cur.list(count, "element map")?;
                }
                "DIST" => {
                    dist.header = Some((
                        cur.field(&mut parts, "rank")?,
                        cur.field(&mut parts, "rank count")?,
                        cur.field(&mut parts, "internal node count")?,
                        cur.field(&mut parts, "boundary node count")?,
                        cur.field(&mut parts, "external node count")?,
                    ));
                }
                "OWNERS" => {
                    let count = cur.field(&mut parts, "owner count")?;
                    dist.owners = Some(cur.list(count, "element owners")?);
                }
                "NODEGLOBALS" => {
                    let count = cur.field(&mut parts, "node global count")?;
                    dist.node_globals = Some(globals(cur.list(count, "node globals")?));
                }
                "ELEMGLOBALS" => {
                    let count = cur.field(&mut parts, "element global count")?;
                    dist.elem_globals = Some(globals(cur.list(count, "element globals")?));
                }
                "SIDESETGLOBALS" => {
                    let count = cur.field(&mut parts, "global side set count")?;
                    dist.side_sets_global = global_sets(&mut cur, count, "global side set")?;
                }
                "NODESETGLOBALS" => {
                    let count = cur.field(&mut parts, "global node set count")?;
                    dist.node_sets_global = global_sets(&mut cur, count, "global node set")?;
                }
                "END" => {
                    saw_end = true;
                    break;
                }
                other => return Err(cur.err(format!("unknown section \"{other}\""))),
            }
        }
        if !saw_end {
            return Err(cur.err("missing END"));
        }

        let dist = dist.assemble(mesh.num_nodes(), mesh.num_elems());
        let shard = FlatShard { mesh, dist };
        shard.validate()?;
        Ok(shard)
    }
}

/// Name suffix of a header line: a space and the name, or nothing.
fn name_suffix(name: &Option<String>) -> String {
    name.as_deref().map(|n| format!(" {n}")).unwrap_or_default()
}

fn write_rows<W: Write>(w: &mut W, rows: &[FlatIndex]) -> std::io::Result<()> {
    writeln!(w, "{}", rows.iter().map(|r| r.idx() + 1).join(" "))
}

impl FlatMeshWriter for TextFlatWriter {
    fn write<W: Write>(&self, mut w: W, shard: &FlatShard) -> Result<(), MeshBridgeError> {
        let FlatShard { mesh, dist } = shard;
        mesh.validate()?;
        if mesh.title.chars().count() > mesh.stored_title().chars().count() {
            log::warn!("title truncated to \"{}\"", mesh.stored_title());
        }

        writeln!(w, "{HEADER}")?;
        writeln!(w, "TITLE {}", mesh.stored_title())?;
        writeln!(w, "DIM {}", mesh.dim)?;
        writeln!(w, "NODES {}", mesh.num_nodes())?;
        for row in 0..mesh.num_nodes() {
            writeln!(w, "{}", mesh.coords.iter().map(|axis| axis[row]).join(" "))?;
        }

        for block in &mesh.blocks {
            writeln!(
                w,
                "BLOCK {} {} {} {}{}",
                block.id,
                block.elem_type,
                block.num_elems(),
                block.nodes_per_elem,
                name_suffix(&block.name)
            )?;
            for local in 0..block.num_elems() {
                write_rows(&mut w, block.element(local))?;
            }
        }
        for set in &mesh.node_sets {
            writeln!(
                w,
                "NODESET {} {}{}",
                set.id,
                set.nodes.len(),
                name_suffix(&set.name)
            )?;
            write_rows(&mut w, &set.nodes)?;
        }
        for set in &mesh.side_sets {
            writeln!(w, "SIDESET {} {}{}", set.id, set.len(), name_suffix(&set.name))?;
            for (elem, side) in set.entries() {
                writeln!(w, "{} {side}", elem.idx() + 1)?;
            }
        }
        if !mesh.node_id_map.is_empty() {
            writeln!(w, "NODEMAP {}", mesh.node_id_map.len())?;
            writeln!(w, "{}", mesh.node_id_map.iter().join(" "))?;
        }
        if !mesh.elem_id_map.is_empty() {
            writeln!(w, "ELEMMAP {}", mesh.elem_id_map.len())?;
            writeln!(w, "{}", mesh.elem_id_map.iter().join(" "))?;
        }

        writeln!(
            w,
            "DIST {} {} {} {} {}",
            dist.rank,
            dist.num_ranks,
            dist.num_internal_nodes,
            dist.num_boundary_nodes,
            dist.num_external_nodes
        )?;
        writeln!(w, "OWNERS {}", dist.elem_owner.len())?;
        writeln!(w, "{}", dist.elem_owner.iter().join(" "))?;
        writeln!(w, "NODEGLOBALS {}", dist.node_index_global.len())?;
        writeln!(w, "{}", dist.node_index_global.iter().join(" "))?;
        writeln!(w, "ELEMGLOBALS {}", dist.elem_index_global.len())?;
        writeln!(w, "{}", dist.elem_index_global.iter().join(" "))?;
        for (keyword, sets) in [
            ("SIDESETGLOBALS", &dist.side_sets_global),
            ("NODESETGLOBALS", &dist.node_sets_global),
        ] {
            writeln!(w, "{keyword} {}", sets.len())?;
            for set in sets {
                writeln!(w, "{} {}", set.id, set.name)?;
            }
        }
        writeln!(w, "END")?;
        Ok(())
    }
}
