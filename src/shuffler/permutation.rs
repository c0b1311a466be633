use rand::seq::SliceRandom;
use rand::Rng;

/// N×N permutation matrix stored as the column picked by each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationMatrix {
    columns: Vec<usize>,
}

impl PermutationMatrix {
    /// Uniformly random permutation of `n` rows (Fisher–Yates).
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut columns: Vec<usize> = (0..n).collect();
        columns.shuffle(rng);
        Self { columns }
    }

    pub fn identity(n: usize) -> Self {
        Self {
            columns: (0..n).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.columns.len()
    }

    /// Column holding the single `1` of `row`.
    pub fn column_of(&self, row: usize) -> Option<usize> {
        self.columns.get(row).copied()
    }

    /// Dense `"0"`/`"1"` rows of width `width`, the padding block being the identity.
    ///
    /// `width` smaller than the matrix is clamped to the matrix size.
    pub fn to_rows(&self, width: usize) -> Vec<Vec<String>> {
        let width = width.max(self.size());
        (0..width)
            .map(|row| {
                let hot = self.column_of(row).unwrap_or(row);
                (0..width)
                    .map(|col| if col == hot { "1" } else { "0" }.to_string())
                    .collect()
            })
            .collect()
    }
}

/// Exactly one `"1"` per row and per column, everything else `"0"`.
pub fn is_permutation(rows: &[Vec<String>]) -> bool {
    let n = rows.len();
    let mut column_hits = vec![0usize; n];
    for row in rows {
        if row.len() != n {
            return false;
        }
        let mut row_hits = 0;
        for (col, cell) in row.iter().enumerate() {
            match cell.as_str() {
                "1" => {
                    row_hits += 1;
                    column_hits[col] += 1;
                }
                "0" => {}
                _ => return false,
            }
        }
        if row_hits != 1 {
            return false;
        }
    }
    column_hits.iter().all(|hits| *hits == 1)
}
