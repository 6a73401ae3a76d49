use super::mesh::space::Point;
use super::Domain;
use crate::integration::Topology;

use smallvec::{smallvec, SmallVec};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Position and field values at local coordinates `s` of an active Elem
///
/// Field values are interpolated from the effective nodal values, so hanging Nodes contribute the values
/// implied by their masters.
pub fn sample_elem(domain: &Domain, elem_id: usize, s: [f64; 2]) -> (Point, SmallVec<[f64; 2]>) {
    let elem = &domain.mesh.elems[elem_id];
    let basis = elem.basis();
    let mut psi = vec![0.0; basis.n_nodes()];
    basis.shape(s, &mut psi);

    let mut point = Point::default();
    let mut values: SmallVec<[f64; 2]> = smallvec![0.0; domain.num_fields()];
    for (w, node_id) in psi.iter().zip(elem.nodes.iter()) {
        point = point + domain.mesh.nodes[*node_id].coords * *w;
        for (field, value) in values.iter_mut().enumerate() {
            *value += w * domain.nodal_value(*node_id, field);
        }
    }
    (point, values)
}

/// Write `x y u_0 ... u_{n-1}` rows for every active Elem
///
/// Quads are sampled on a uniform `nplot x nplot` grid of local coordinates; triangles on the
/// corresponding lattice of `nplot (nplot + 1) / 2` points. Blocks of rows from different Elems are
/// separated by a blank line.
pub fn write_tabular<W: Write>(domain: &Domain, writer: &mut W, nplot: usize) -> io::Result<()> {
    if nplot < 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("nplot must be at least 2 (got {}); Cannot write fields!", nplot),
        ));
    }

    for elem in domain.mesh.active_elems() {
        for s in plot_points(elem.topology(), nplot) {
            let (point, values) = sample_elem(domain, elem.id, s);
            write!(writer, "{:.10} {:.10}", point.x, point.y)?;
            for value in values.iter() {
                write!(writer, " {:.15}", value)?;
            }
            writeln!(writer)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Same as [write_tabular], writing to a new file at `path`
pub fn write_tabular_file(domain: &Domain, path: impl AsRef<str>, nplot: usize) -> io::Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_tabular(domain, &mut writer, nplot)?;
    writer.flush()
}

fn plot_points(topology: Topology, nplot: usize) -> Vec<[f64; 2]> {
    match topology {
        Topology::Triangle => {
            let step = 1.0 / (nplot - 1) as f64;
            let mut points = Vec::with_capacity(nplot * (nplot + 1) / 2);
            for j in 0..nplot {
                for i in 0..nplot - j {
                    points.push([i as f64 * step, j as f64 * step]);
                }
            }
            points
        }
        _ => {
            let range = uniform_range(-1.0, 1.0, nplot);
            range
                .iter()
                .flat_map(|v| range.iter().map(move |u| [*u, *v]))
                .collect()
        }
    }
}

fn uniform_range(min: f64, max: f64, n: usize) -> Vec<f64> {
    let step = (max - min) / ((n - 1) as f64);
    (0..n).map(|i| (i as f64) * step + min).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::NodeSpacing;
    use crate::domain::mesh::Mesh;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tabular_output() {
        let mesh = Mesh::from_file("./test_input/two_elems.json", 2, NodeSpacing::GaussLobatto).unwrap();
        let mut domain = Domain::new(mesh, 2).unwrap();
        for node in domain.mesh.nodes.iter_mut() {
            node.values[0] = node.coords.x;
            node.values[1] = node.coords.x * node.coords.y;
        }

        let mut buffer: Vec<u8> = Vec::new();
        write_tabular(&domain, &mut buffer, 3).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let blocks: Vec<&str> = text.split("\n\n").filter(|b| !b.trim().is_empty()).collect();
        assert_eq!(blocks.len(), 2);
        for block in blocks {
            let rows: Vec<Vec<f64>> = block
                .lines()
                .map(|l| l.split_whitespace().map(|v| v.parse().unwrap()).collect())
                .collect();
            assert_eq!(rows.len(), 9);
            for row in rows {
                assert_eq!(row.len(), 4);
                assert_abs_diff_eq!(row[2], row[0], epsilon = 1e-9);
                assert_abs_diff_eq!(row[3], row[0] * row[1], epsilon = 1e-9);
            }
        }

        std::fs::create_dir_all("./test_output").unwrap();
        write_tabular_file(&domain, "./test_output/two_elems.dat", 4).unwrap();
    }

    #[test]
    fn triangle_lattice() {
        let points = plot_points(Topology::Triangle, 4);
        assert_eq!(points.len(), 10);
        assert!(points.iter().all(|s| s[0] + s[1] <= 1.0 + 1e-14));
    }

    #[test]
    #[should_panic]
    fn too_few_plot_points() {
        let mesh = Mesh::from_file("./test_input/unit_square.json", 1, NodeSpacing::Equispaced).unwrap();
        let domain = Domain::new(mesh, 1).unwrap();
        write_tabular(&domain, &mut io::sink(), 1).unwrap();
    }
}
