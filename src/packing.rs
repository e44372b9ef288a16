use crate::guillotine::{FitPolicy, ScoredPlacement, Sheet, SplitRule};
use crate::types::{Gene, Part, PartInstance, Rect, SheetSpec};

/// The outcome of one packing pass: filled sheets plus the instance indices
/// that fit no sheet in any permitted orientation.
#[derive(Debug, Clone)]
pub struct Packing {
    pub sheets: Vec<Sheet>,
    pub leftovers: Vec<usize>,
}

impl Packing {
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn placed_count(&self) -> usize {
        self.sheets.iter().map(|s| s.placed.len()).sum()
    }

    pub fn used_area(&self) -> u64 {
        self.sheets.iter().map(|s| s.used_area()).sum()
    }

    pub fn total_area(&self, spec: &SheetSpec) -> u64 {
        spec.area() * self.sheets.len() as u64
    }

    pub fn waste_area(&self, spec: &SheetSpec) -> u64 {
        self.total_area(spec) - self.used_area()
    }

    pub fn efficiency_percent(&self, spec: &SheetSpec) -> f64 {
        let total = self.total_area(spec);
        if total == 0 {
            return 0.0;
        }
        self.used_area() as f64 / total as f64 * 100.0
    }

    pub fn leftover_area(&self, parts: &[Part], instances: &[PartInstance]) -> u64 {
        self.leftovers
            .iter()
            .map(|&i| parts[instances[i].part].rect().area())
            .sum()
    }
}

/// Expands part quantities into individual placeable instances.
pub fn expand_parts(parts: &[Part]) -> Vec<PartInstance> {
    parts
        .iter()
        .enumerate()
        .flat_map(|(part, p)| (0..p.quantity).map(move |_| PartInstance { part }))
        .collect()
}

fn fits_empty_sheet(piece: Rect, allow_rotate: bool, spec: &SheetSpec) -> bool {
    let footprint = Rect::new(piece.w + spec.kerf, piece.h + spec.kerf);
    footprint.fits_in(&spec.rect()) || (allow_rotate && footprint.rotated().fits_in(&spec.rect()))
}

/// Decodes a gene sequence into sheets. Genes are honoured in order; a gene's
/// rotation request is applied only when its part permits rotation. Sheets
/// are tried in creation order and a new one opens only when every existing
/// sheet rejects the piece. Pieces too large for even an empty sheet become
/// leftovers, not errors.
pub fn pack_genes(
    genes: &[Gene],
    parts: &[Part],
    instances: &[PartInstance],
    spec: &SheetSpec,
    rule: SplitRule,
) -> Packing {
    let mut sheets: Vec<Sheet> = Vec::new();
    let mut leftovers: Vec<usize> = Vec::new();

    for gene in genes {
        let part_idx = instances[gene.instance].part;
        let part = &parts[part_idx];
        let allow_rotate = part.rotation_allowed;
        let pre_rotated = gene.rotated && allow_rotate;
        let piece = if pre_rotated {
            part.rect().rotated()
        } else {
            part.rect()
        };

        let mut placed = false;
        for sheet in &mut sheets {
            if sheet
                .try_place(gene.instance, part_idx, piece, pre_rotated, allow_rotate, rule)
                .is_some()
            {
                placed = true;
                break;
            }
        }
        if placed {
            continue;
        }

        if !fits_empty_sheet(piece, allow_rotate, spec) {
            leftovers.push(gene.instance);
            continue;
        }

        let mut sheet = Sheet::new(*spec);
        sheet
            .try_place(gene.instance, part_idx, piece, pre_rotated, allow_rotate, rule)
            .expect("piece fits an empty sheet");
        sheets.push(sheet);
    }

    Packing { sheets, leftovers }
}

/// One-pass greedy packer: instances in descending area order, each placed
/// into the best-scoring position across all open sheets under `policy`.
pub fn pack_greedy(
    parts: &[Part],
    instances: &[PartInstance],
    spec: &SheetSpec,
    policy: FitPolicy,
    rule: SplitRule,
) -> Packing {
    let mut order: Vec<usize> = (0..instances.len()).collect();
    order.sort_by(|&a, &b| {
        let area_a = parts[instances[a].part].rect().area();
        let area_b = parts[instances[b].part].rect().area();
        area_b.cmp(&area_a)
    });

    let mut sheets: Vec<Sheet> = Vec::new();
    let mut leftovers: Vec<usize> = Vec::new();

    for idx in order {
        let part_idx = instances[idx].part;
        let part = &parts[part_idx];
        let piece = part.rect();
        let allow_rotate = part.rotation_allowed;

        let mut best: Option<(usize, ScoredPlacement)> = None;
        for (si, sheet) in sheets.iter().enumerate() {
            if let Some(scored) = sheet.find_best(piece, allow_rotate, policy)
                && (best.is_none() || scored.score < best.unwrap().1.score)
            {
                best = Some((si, scored));
            }
        }

        if let Some((si, scored)) = best {
            sheets[si].place(idx, part_idx, scored, piece, false, rule);
            continue;
        }

        let mut sheet = Sheet::new(*spec);
        match sheet.find_best(piece, allow_rotate, policy) {
            Some(scored) => {
                sheet.place(idx, part_idx, scored, piece, false, rule);
                sheets.push(sheet);
            }
            None => leftovers.push(idx),
        }
    }

    Packing { sheets, leftovers }
}
