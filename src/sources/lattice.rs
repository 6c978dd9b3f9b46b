use std::path::Path;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::ExtractError;
use crate::model::{RawCell, RawTable, SourceKind, SourcedTable};
use crate::options::{ExtractOptions, PageSelection};
use crate::sources::TableSource;
use crate::sources::pdf_text::{page_font_encodings, push_shown_text, selected_pages};

// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Self(values))
    }

    fn then(self, other: Self) -> Self {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Self([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(values)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Horizontal,
    Vertical,
}

// `position` is the y of a horizontal edge or the x of a vertical one;
// `start..=end` spans the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub orientation: Orientation,
    pub position: f64,
    pub start: f64,
    pub end: f64,
}

impl Edge {
    fn from_segment(from: (f64, f64), to: (f64, f64), tolerance: f64) -> Option<Self> {
        let (x0, y0) = from;
        let (x1, y1) = to;
        if (y0 - y1).abs() <= tolerance && (x0 - x1).abs() > tolerance {
            return Some(Self {
                orientation: Orientation::Horizontal,
                position: (y0 + y1) / 2.0,
                start: x0.min(x1),
                end: x0.max(x1),
            });
        }
        if (x0 - x1).abs() <= tolerance && (y0 - y1).abs() > tolerance {
            return Some(Self {
                orientation: Orientation::Vertical,
                position: (x0 + x1) / 2.0,
                start: y0.min(y1),
                end: y0.max(y1),
            });
        }
        None
    }

    fn touches(&self, other: &Self, tolerance: f64) -> bool {
        let (horizontal, vertical) = match (self.orientation, other.orientation) {
            (Orientation::Horizontal, Orientation::Vertical) => (self, other),
            (Orientation::Vertical, Orientation::Horizontal) => (other, self),
            _ => return false,
        };
        vertical.position >= horizontal.start - tolerance
            && vertical.position <= horizontal.end + tolerance
            && horizontal.position >= vertical.start - tolerance
            && horizontal.position <= vertical.end + tolerance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextFragment {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

#[derive(Debug, Default)]
struct PageGeometry {
    edges: Vec<Edge>,
    fragments: Vec<TextFragment>,
}

struct GeometryCollector<'a> {
    tolerance: f64,
    ctm: Matrix,
    saved: Vec<Matrix>,
    path: Vec<((f64, f64), (f64, f64))>,
    current_point: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    encoding: Option<&'a str>,
    fragment: Option<TextFragment>,
    geometry: PageGeometry,
}

impl<'a> GeometryCollector<'a> {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            encoding: None,
            fragment: None,
            geometry: PageGeometry::default(),
        }
    }

    fn flush_fragment(&mut self) {
        if let Some(fragment) = self.fragment.take() {
            if !fragment.text.trim().is_empty() {
                self.geometry.fragments.push(TextFragment {
                    text: fragment.text.trim().to_string(),
                    ..fragment
                });
            }
        }
    }

    fn move_text_line(&mut self, tx: f64, ty: f64) {
        self.flush_fragment();
        self.line_matrix = Matrix::translation(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show_text(&mut self, operands: &[Object]) {
        let (x, y) = self.text_matrix.then(self.ctm).apply(0.0, 0.0);
        let encoding = self.encoding;
        let fragment = self.fragment.get_or_insert_with(|| TextFragment {
            x,
            y,
            text: String::new(),
        });
        push_shown_text(&mut fragment.text, encoding, operands);
    }

    fn add_segment(&mut self, to: (f64, f64)) {
        if let Some(from) = self.current_point {
            self.path.push((from, to));
        }
        self.current_point = Some(to);
    }

    fn paint_path(&mut self) {
        for (from, to) in std::mem::take(&mut self.path) {
            let from = self.ctm.apply(from.0, from.1);
            let to = self.ctm.apply(to.0, to.1);
            if let Some(edge) = Edge::from_segment(from, to, self.tolerance) {
                self.geometry.edges.push(edge);
            }
        }
        self.current_point = None;
        self.subpath_start = None;
    }

    fn handle(&mut self, operator: &str, operands: &[Object], encodings: &[(Vec<u8>, &'a str)]) {
        match operator {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.ctm = matrix.then(self.ctm);
                }
            }
            "m" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    self.current_point = Some((x, y));
                    self.subpath_start = Some((x, y));
                }
            }
            "l" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    self.add_segment((x, y));
                }
            }
            "h" => {
                if let Some(start) = self.subpath_start {
                    self.add_segment(start);
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = numbers::<4>(operands) {
                    let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
                    for (index, from) in corners.iter().enumerate() {
                        self.path.push((*from, corners[(index + 1) % corners.len()]));
                    }
                    self.current_point = Some((x, y));
                    self.subpath_start = Some((x, y));
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => self.paint_path(),
            "n" => {
                self.path.clear();
                self.current_point = None;
                self.subpath_start = None;
            }
            "BT" => {
                self.flush_fragment();
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.flush_fragment(),
            "Tf" => {
                self.encoding = operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .and_then(|name| {
                        encodings
                            .iter()
                            .find(|(font, _)| font.as_slice() == name)
                            .map(|(_, encoding)| *encoding)
                    });
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.move_text_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.leading = -ty;
                    self.move_text_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.flush_fragment();
                    self.line_matrix = matrix;
                    self.text_matrix = matrix;
                }
            }
            "T*" => self.move_text_line(0.0, -self.leading),
            "Tj" | "TJ" => self.show_text(operands),
            "'" => {
                self.move_text_line(0.0, -self.leading);
                self.show_text(operands);
            }
            "\"" => {
                self.move_text_line(0.0, -self.leading);
                self.show_text(operands.get(2..).unwrap_or_default());
            }
            _ => {}
        }
    }
}

fn page_geometry(
    document: &Document,
    page_id: ObjectId,
    tolerance: f64,
) -> Result<PageGeometry, ExtractError> {
    let raw_content = document.get_page_content(page_id)?;
    let content = Content::decode(&raw_content)?;
    let encodings = page_font_encodings(document, page_id)
        .into_iter()
        .collect::<Vec<_>>();

    let mut collector = GeometryCollector::new(tolerance);
    for operation in &content.operations {
        collector.handle(&operation.operator, &operation.operands, &encodings);
    }
    collector.flush_fragment();

    Ok(collector.geometry)
}

fn merge_positions(mut positions: Vec<f64>, tolerance: f64) -> Vec<f64> {
    positions.sort_by(f64::total_cmp);
    let mut merged: Vec<f64> = Vec::with_capacity(positions.len());
    for position in positions {
        match merged.last() {
            Some(last) if position - last <= tolerance => {}
            _ => merged.push(position),
        }
    }
    merged
}

fn root(parent: &mut [usize], mut index: usize) -> usize {
    while parent[index] != index {
        parent[index] = parent[parent[index]];
        index = parent[index];
    }
    index
}

fn group_edges(edges: &[Edge], tolerance: f64) -> Vec<Vec<Edge>> {
    let mut parent = (0..edges.len()).collect::<Vec<_>>();

    for left in 0..edges.len() {
        for right in (left + 1)..edges.len() {
            if edges[left].touches(&edges[right], tolerance) {
                let (a, b) = (root(&mut parent, left), root(&mut parent, right));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Edge>)> = Vec::new();
    for (index, edge) in edges.iter().enumerate() {
        let group_root = root(&mut parent, index);
        match groups.iter_mut().find(|(existing, _)| *existing == group_root) {
            Some((_, members)) => members.push(*edge),
            None => groups.push((group_root, vec![*edge])),
        }
    }

    groups.into_iter().map(|(_, members)| members).collect()
}

pub(crate) fn build_grids(
    edges: &[Edge],
    fragments: &[TextFragment],
    tolerance: f64,
) -> Vec<RawTable> {
    let mut ordered = fragments.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| right.y.total_cmp(&left.y).then(left.x.total_cmp(&right.x)));

    let mut grids = Vec::new();
    for group in group_edges(edges, tolerance) {
        let (horizontal, vertical): (Vec<&Edge>, Vec<&Edge>) = group
            .iter()
            .partition(|edge| edge.orientation == Orientation::Horizontal);

        let mut row_bounds = merge_positions(
            horizontal.iter().map(|edge| edge.position).collect(),
            tolerance,
        );
        row_bounds.reverse();
        let column_bounds = merge_positions(
            vertical.iter().map(|edge| edge.position).collect(),
            tolerance,
        );

        // a header row and at least one data row
        if row_bounds.len() < 3 || column_bounds.len() < 2 {
            continue;
        }

        let row_count = row_bounds.len() - 1;
        let column_count = column_bounds.len() - 1;
        let mut cells: Vec<Vec<RawCell>> = vec![vec![None; column_count]; row_count];
        let mut has_text = false;

        for fragment in &ordered {
            let row = row_bounds
                .windows(2)
                .position(|pair| fragment.y <= pair[0] + tolerance && fragment.y > pair[1]);
            let column = column_bounds
                .windows(2)
                .position(|pair| fragment.x >= pair[0] - tolerance && fragment.x < pair[1]);
            let (Some(row), Some(column)) = (row, column) else {
                continue;
            };

            let cell = cells[row][column].get_or_insert_with(String::new);
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(&fragment.text);
            has_text = true;
        }

        if has_text {
            grids.push((row_bounds[0], RawTable::new(cells)));
        }
    }

    grids.sort_by(|left, right| right.0.total_cmp(&left.0));
    grids.into_iter().map(|(_, table)| table).collect()
}

#[derive(Debug, Clone)]
pub struct LatticeSource {
    pages: Option<PageSelection>,
    tolerance: f64,
}

impl LatticeSource {
    #[must_use]
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            pages: options.pages.clone(),
            tolerance: f64::from(options.edge_tolerance),
        }
    }
}

impl TableSource for LatticeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Lattice
    }

    fn read_tables(&self, path: &Path) -> Result<Vec<SourcedTable>, ExtractError> {
        let document = Document::load(path)?;
        let pages = selected_pages(&document, self.pages.as_ref());
        if pages.is_empty() {
            return Err(ExtractError::NoPagesSelected);
        }

        let mut tables = Vec::new();
        for (page_no, page_id) in pages {
            let geometry = page_geometry(&document, page_id, self.tolerance)?;
            let grids = build_grids(&geometry.edges, &geometry.fragments, self.tolerance);
            debug!(
                page = page_no,
                edges = geometry.edges.len(),
                fragments = geometry.fragments.len(),
                grids = grids.len(),
                "lattice scan"
            );
            tables.extend(grids);
        }

        Ok(tables
            .into_iter()
            .enumerate()
            .map(|(index, table)| SourcedTable {
                id_hint: format!("{}_table_{index}", SourceKind::Lattice.id_prefix()),
                table,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Edge, Matrix, Orientation, TextFragment, build_grids, merge_positions};

    fn horizontal(y: f64, start: f64, end: f64) -> Edge {
        Edge {
            orientation: Orientation::Horizontal,
            position: y,
            start,
            end,
        }
    }

    fn vertical(x: f64, start: f64, end: f64) -> Edge {
        Edge {
            orientation: Orientation::Vertical,
            position: x,
            start,
            end,
        }
    }

    fn fragment(x: f64, y: f64, text: &str) -> TextFragment {
        TextFragment {
            x,
            y,
            text: text.to_string(),
        }
    }

    /// A 2-column, 3-row grid spanning x 100..300 and y 500..680.
    fn grid_edges() -> Vec<Edge> {
        let mut edges = [680.0, 620.0, 560.0, 500.0]
            .into_iter()
            .map(|y| horizontal(y, 100.0, 300.0))
            .collect::<Vec<_>>();
        edges.extend(
            [100.0, 200.0, 300.0]
                .into_iter()
                .map(|x| vertical(x, 500.0, 680.0)),
        );
        edges
    }

    #[test]
    fn composes_transforms_in_pdf_order() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let shift = Matrix::translation(10.0, 20.0);
        assert_eq!(scale.then(shift).apply(1.0, 1.0), (12.0, 22.0));
        assert_eq!(shift.then(scale).apply(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn classifies_segments_by_axis() {
        let edge = Edge::from_segment((10.0, 50.0), (90.0, 50.5), 1.0).expect("horizontal edge");
        assert_eq!(edge.orientation, Orientation::Horizontal);
        assert_eq!((edge.start, edge.end), (10.0, 90.0));

        assert!(Edge::from_segment((0.0, 0.0), (40.0, 40.0), 1.0).is_none());
        assert!(Edge::from_segment((0.0, 0.0), (0.5, 0.0), 1.0).is_none());
    }

    #[test]
    fn merges_close_positions() {
        assert_eq!(
            merge_positions(vec![10.0, 300.0, 10.8, 150.0], 1.0),
            vec![10.0, 150.0, 300.0]
        );
    }

    #[test]
    fn assigns_text_to_grid_cells() {
        let fragments = vec![
            fragment(110.0, 640.0, "Name"),
            fragment(210.0, 640.0, "Age"),
            fragment(110.0, 580.0, "Ana"),
            fragment(210.0, 580.0, "30"),
            fragment(110.0, 520.0, "Bo"),
            fragment(400.0, 520.0, "outside"),
        ];

        let grids = build_grids(&grid_edges(), &fragments, 2.0);
        assert_eq!(grids.len(), 1);
        assert_eq!(
            grids[0].rows,
            vec![
                vec![Some("Name".to_string()), Some("Age".to_string())],
                vec![Some("Ana".to_string()), Some("30".to_string())],
                vec![Some("Bo".to_string()), None],
            ]
        );
    }

    #[test]
    fn joins_multiple_fragments_in_reading_order() {
        let fragments = vec![
            fragment(150.0, 600.0, "Name"),
            fragment(110.0, 600.0, "Full"),
            fragment(110.0, 580.0, "x"),
        ];
        let grids = build_grids(&grid_edges(), &fragments, 2.0);
        assert_eq!(grids[0].rows[1][0].as_deref(), Some("Full Name x"));
    }

    #[test]
    fn ignores_boxes_and_grids_without_text() {
        let frame = vec![
            horizontal(700.0, 50.0, 500.0),
            horizontal(100.0, 50.0, 500.0),
            vertical(50.0, 100.0, 700.0),
            vertical(500.0, 100.0, 700.0),
        ];
        let text = vec![fragment(60.0, 400.0, "A boxed paragraph")];
        assert!(build_grids(&frame, &text, 2.0).is_empty());
        assert!(build_grids(&grid_edges(), &[], 2.0).is_empty());
    }

    #[test]
    fn separate_grids_are_separate_tables_top_first() {
        let mut edges = grid_edges()
            .into_iter()
            .map(|mut edge| {
                if edge.orientation == Orientation::Horizontal {
                    edge.position -= 400.0;
                } else {
                    edge.start -= 400.0;
                    edge.end -= 400.0;
                }
                edge
            })
            .collect::<Vec<_>>();
        edges.extend(grid_edges());

        let fragments = vec![
            fragment(110.0, 640.0, "top"),
            fragment(110.0, 240.0, "bottom"),
        ];
        let grids = build_grids(&edges, &fragments, 2.0);
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].rows[0][0].as_deref(), Some("top"));
        assert_eq!(grids[1].rows[0][0].as_deref(), Some("bottom"));
    }
}
