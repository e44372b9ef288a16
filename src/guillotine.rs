use crate::types::{FreeRect, PlacedPiece, Rect, SheetSpec};

/// Policy choosing which of the two possible guillotine cuts to make when
/// splitting the leftover L-shaped region. Fixed once per packing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRule {
    ShorterAxis,
    LongerAxis,
    MinArea,
    MaxArea,
}

impl SplitRule {
    pub const ALL: [SplitRule; 4] = [
        SplitRule::ShorterAxis,
        SplitRule::LongerAxis,
        SplitRule::MinArea,
        SplitRule::MaxArea,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SplitRule::ShorterAxis => "shorter-axis",
            SplitRule::LongerAxis => "longer-axis",
            SplitRule::MinArea => "min-area",
            SplitRule::MaxArea => "max-area",
        }
    }
}

/// Scoring rule for choosing a free rectangle. `MinWaste` is the chromosome
/// decoder's rule (smallest leftover area, first candidate wins ties); the
/// rest drive the standalone greedy strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitPolicy {
    MinWaste,
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    BottomLeft,
}

impl FitPolicy {
    pub fn name(self) -> &'static str {
        match self {
            FitPolicy::MinWaste => "min-waste",
            FitPolicy::BestAreaFit => "best-area-fit",
            FitPolicy::BestShortSideFit => "best-short-side-fit",
            FitPolicy::BestLongSideFit => "best-long-side-fit",
            FitPolicy::BottomLeft => "bottom-left",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredPlacement {
    pub free_idx: usize,
    pub rotated: bool,
    pub score: (u64, u64),
}

/// One physical stock board being filled. Owns its free-space set and
/// placements; created lazily and never shared across packing passes.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub width: u32,
    pub height: u32,
    kerf: u32,
    pub free_rects: Vec<FreeRect>,
    pub placed: Vec<PlacedPiece>,
    used_area: u64,
}

impl Sheet {
    pub fn new(spec: SheetSpec) -> Self {
        Self {
            width: spec.width,
            height: spec.height,
            kerf: spec.kerf,
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                width: spec.width,
                height: spec.height,
            }],
            placed: Vec::new(),
            used_area: 0,
        }
    }

    pub fn used_area(&self) -> u64 {
        self.used_area
    }

    /// The space a piece occupies on the board: its size plus one kerf on
    /// each axis, so neighbouring pieces end up one blade-width apart.
    fn footprint(&self, piece: Rect) -> Rect {
        Rect::new(piece.w + self.kerf, piece.h + self.kerf)
    }

    pub fn find_best(
        &self,
        piece: Rect,
        allow_rotate: bool,
        policy: FitPolicy,
    ) -> Option<ScoredPlacement> {
        let mut best: Option<ScoredPlacement> = None;
        let footprint = self.footprint(piece);
        let rotated_footprint = footprint.rotated();

        for (idx, free) in self.free_rects.iter().enumerate() {
            // Normal orientation
            if free.admits(footprint) {
                let score = Self::score(footprint, *free, policy);
                if best.is_none() || score < best.unwrap().score {
                    best = Some(ScoredPlacement {
                        free_idx: idx,
                        rotated: false,
                        score,
                    });
                }
            }
            // Rotated orientation
            if allow_rotate && free.admits(rotated_footprint) {
                let score = Self::score(rotated_footprint, *free, policy);
                if best.is_none() || score < best.unwrap().score {
                    best = Some(ScoredPlacement {
                        free_idx: idx,
                        rotated: true,
                        score,
                    });
                }
            }
        }

        best
    }

    fn score(footprint: Rect, free: FreeRect, policy: FitPolicy) -> (u64, u64) {
        let short = std::cmp::min(free.width - footprint.w, free.height - footprint.h) as u64;
        let long = std::cmp::max(free.width - footprint.w, free.height - footprint.h) as u64;
        match policy {
            FitPolicy::MinWaste => (free.area() - footprint.area(), 0),
            FitPolicy::BestAreaFit => (free.area() - footprint.area(), short),
            FitPolicy::BestShortSideFit => (short, long),
            FitPolicy::BestLongSideFit => (long, short),
            FitPolicy::BottomLeft => (free.y as u64, free.x as u64),
        }
    }

    /// Commits a scored placement. `base_rotated` marks `piece` as already
    /// rotated relative to its part, so the stored flag reflects the net
    /// orientation.
    pub fn place(
        &mut self,
        instance: usize,
        part: usize,
        scored: ScoredPlacement,
        piece: Rect,
        base_rotated: bool,
        rule: SplitRule,
    ) -> PlacedPiece {
        let oriented = if scored.rotated {
            piece.rotated()
        } else {
            piece
        };
        let footprint = self.footprint(oriented);
        let free = self.free_rects[scored.free_idx];

        self.free_rects.swap_remove(scored.free_idx);
        self.split(free, footprint, rule);
        self.merge_free_rects();

        let inset = self.kerf / 2;
        let placement = PlacedPiece {
            instance,
            part,
            x: free.x + inset,
            y: free.y + inset,
            width: oriented.w,
            height: oriented.h,
            rotated: base_rotated ^ scored.rotated,
        };
        self.used_area += oriented.area();
        self.placed.push(placement);

        placement
    }

    /// Places a piece in the chromosome decoder's manner: smallest leftover
    /// area wins, first candidate on ties. Returns `None` when no free
    /// rectangle admits the piece in any permitted orientation.
    pub fn try_place(
        &mut self,
        instance: usize,
        part: usize,
        piece: Rect,
        base_rotated: bool,
        allow_rotate: bool,
        rule: SplitRule,
    ) -> Option<PlacedPiece> {
        let scored = self.find_best(piece, allow_rotate, FitPolicy::MinWaste)?;
        Some(self.place(instance, part, scored, piece, base_rotated, rule))
    }

    /// Splits the leftover of `free` around `footprint` with a single
    /// straight cut, yielding 0-2 new free rectangles.
    fn split(&mut self, free: FreeRect, footprint: Rect, rule: SplitRule) {
        let right_w = free.width - footprint.w;
        let bottom_h = free.height - footprint.h;

        if right_w == 0 && bottom_h == 0 {
            return;
        }
        if right_w == 0 {
            self.free_rects.push(FreeRect {
                x: free.x,
                y: free.y + footprint.h,
                width: free.width,
                height: bottom_h,
            });
            return;
        }
        if bottom_h == 0 {
            self.free_rects.push(FreeRect {
                x: free.x + footprint.w,
                y: free.y,
                width: right_w,
                height: free.height,
            });
            return;
        }

        // Horizontal cut: bottom remainder spans the full width
        let h_right = FreeRect {
            x: free.x + footprint.w,
            y: free.y,
            width: right_w,
            height: footprint.h,
        };
        let h_bottom = FreeRect {
            x: free.x,
            y: free.y + footprint.h,
            width: free.width,
            height: bottom_h,
        };
        // Vertical cut: right remainder spans the full height
        let v_right = FreeRect {
            x: free.x + footprint.w,
            y: free.y,
            width: right_w,
            height: free.height,
        };
        let v_bottom = FreeRect {
            x: free.x,
            y: free.y + footprint.h,
            width: footprint.w,
            height: bottom_h,
        };

        let h_larger = h_right.area().max(h_bottom.area());
        let v_larger = v_right.area().max(v_bottom.area());

        let horizontal = match rule {
            SplitRule::ShorterAxis => free.width <= free.height,
            SplitRule::LongerAxis => free.width > free.height,
            SplitRule::MinArea => h_larger <= v_larger,
            SplitRule::MaxArea => h_larger >= v_larger,
        };

        if horizontal {
            self.free_rects.push(h_right);
            self.free_rects.push(h_bottom);
        } else {
            self.free_rects.push(v_right);
            self.free_rects.push(v_bottom);
        }
    }

    fn merge_free_rects(&mut self) {
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..self.free_rects.len() {
                for j in (i + 1)..self.free_rects.len() {
                    if let Some(m) = Self::try_merge(self.free_rects[i], self.free_rects[j]) {
                        self.free_rects[i] = m;
                        self.free_rects.swap_remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
    }

    fn try_merge(a: FreeRect, b: FreeRect) -> Option<FreeRect> {
        // Same row, same height, adjacent in x
        if a.y == b.y && a.height == b.height {
            if a.x + a.width == b.x || b.x + b.width == a.x {
                return Some(FreeRect {
                    x: a.x.min(b.x),
                    y: a.y,
                    width: a.width + b.width,
                    height: a.height,
                });
            }
        }
        // Same column, same width, adjacent in y
        if a.x == b.x && a.width == b.width {
            if a.y + a.height == b.y || b.y + b.height == a.y {
                return Some(FreeRect {
                    x: a.x,
                    y: a.y.min(b.y),
                    width: a.width,
                    height: a.height + b.height,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(width: u32, height: u32, kerf: u32) -> SheetSpec {
        SheetSpec {
            width,
            height,
            kerf,
        }
    }

    #[test]
    fn test_place_single_piece() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        let p = sheet
            .try_place(0, 0, Rect::new(50, 30), false, false, SplitRule::ShorterAxis)
            .unwrap();
        assert_eq!((p.x, p.y), (0, 0));
        assert_eq!((p.width, p.height), (50, 30));
        assert!(!p.rotated);
        assert!(!sheet.free_rects.is_empty());
        assert_eq!(sheet.used_area(), 1500);
    }

    #[test]
    fn test_piece_too_large() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        assert!(
            sheet
                .try_place(0, 0, Rect::new(200, 50), false, false, SplitRule::ShorterAxis)
                .is_none()
        );
        assert!(sheet.placed.is_empty());
    }

    #[test]
    fn test_rotation_fit() {
        let mut sheet = Sheet::new(spec(100, 50, 0));
        let piece = Rect::new(50, 100);
        // Doesn't fit without rotation
        assert!(sheet.find_best(piece, false, FitPolicy::MinWaste).is_none());
        // Fits with rotation
        let p = sheet
            .try_place(0, 0, piece, false, true, SplitRule::ShorterAxis)
            .unwrap();
        assert!(p.rotated);
        assert_eq!((p.width, p.height), (100, 50));
    }

    #[test]
    fn test_base_rotated_flag_is_net_orientation() {
        // Piece arrives pre-rotated and is placed as-is: net flag stays true.
        let mut sheet = Sheet::new(spec(100, 50, 0));
        let p = sheet
            .try_place(0, 0, Rect::new(100, 50), true, true, SplitRule::ShorterAxis)
            .unwrap();
        assert!(p.rotated);
    }

    #[test]
    fn test_kerf_offsets_placement() {
        let mut sheet = Sheet::new(spec(100, 100, 4));
        let p = sheet
            .try_place(0, 0, Rect::new(40, 40), false, false, SplitRule::ShorterAxis)
            .unwrap();
        // Footprint 44x44 at origin, stored piece inset by kerf/2
        assert_eq!((p.x, p.y), (2, 2));
        assert_eq!((p.width, p.height), (40, 40));
    }

    #[test]
    fn test_kerf_separates_neighbours() {
        let mut sheet = Sheet::new(spec(100, 100, 4));
        let a = sheet
            .try_place(0, 0, Rect::new(40, 96), false, false, SplitRule::ShorterAxis)
            .unwrap();
        let b = sheet
            .try_place(1, 0, Rect::new(40, 96), false, false, SplitRule::ShorterAxis)
            .unwrap();
        // Gap between a's right edge and b's left edge is exactly one kerf
        assert_eq!(b.x - (a.x + a.width), 4);
    }

    #[test]
    fn test_fill_exact() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        sheet
            .try_place(0, 0, Rect::new(100, 100), false, false, SplitRule::ShorterAxis)
            .unwrap();
        assert!(sheet.free_rects.is_empty());
    }

    #[test]
    fn test_free_rects_never_overlap() {
        let mut sheet = Sheet::new(spec(200, 300, 3));
        for (i, piece) in [
            Rect::new(90, 60),
            Rect::new(50, 120),
            Rect::new(40, 40),
            Rect::new(100, 30),
        ]
        .into_iter()
        .enumerate()
        {
            let _ = sheet.try_place(i, 0, piece, false, true, SplitRule::MinArea);
        }
        for i in 0..sheet.free_rects.len() {
            for j in (i + 1)..sheet.free_rects.len() {
                let a = sheet.free_rects[i];
                let b = sheet.free_rects[j];
                let overlap = a.x < b.x + b.width
                    && b.x < a.x + a.width
                    && a.y < b.y + b.height
                    && b.y < a.y + a.height;
                assert!(!overlap, "free rects {a:?} and {b:?} overlap");
            }
        }
    }

    #[test]
    fn test_split_shorter_axis_spans_full_width_on_tall_sheet() {
        // Sheet taller than wide: shorter side is horizontal, so the cut is
        // horizontal and the bottom remainder spans the full width.
        let mut sheet = Sheet::new(spec(100, 200, 0));
        sheet
            .try_place(0, 0, Rect::new(60, 50), false, false, SplitRule::ShorterAxis)
            .unwrap();
        assert!(
            sheet
                .free_rects
                .iter()
                .any(|f| f.width == 100 && f.height == 150 && f.y == 50)
        );
    }

    #[test]
    fn test_split_longer_axis_spans_full_height_on_tall_sheet() {
        let mut sheet = Sheet::new(spec(100, 200, 0));
        sheet
            .try_place(0, 0, Rect::new(60, 50), false, false, SplitRule::LongerAxis)
            .unwrap();
        assert!(
            sheet
                .free_rects
                .iter()
                .any(|f| f.width == 40 && f.height == 200 && f.x == 60)
        );
    }

    #[test]
    fn test_split_min_area_balances_remainders() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        sheet
            .try_place(0, 0, Rect::new(90, 10), false, false, SplitRule::MinArea)
            .unwrap();
        // Horizontal cut leaves 10x10 and 100x90 (larger 9000); vertical cut
        // leaves 10x100 and 90x90 (larger 8100). MinArea picks the vertical cut.
        let max_free = sheet.free_rects.iter().map(|f| f.area()).max().unwrap();
        assert_eq!(max_free, 8100);
    }

    #[test]
    fn test_split_max_area_keeps_largest_remainder() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        sheet
            .try_place(0, 0, Rect::new(90, 10), false, false, SplitRule::MaxArea)
            .unwrap();
        let max_free = sheet.free_rects.iter().map(|f| f.area()).max().unwrap();
        assert_eq!(max_free, 9000);
    }

    #[test]
    fn test_min_waste_prefers_tightest_rect() {
        let mut sheet = Sheet::new(spec(200, 200, 0));
        // Carve the sheet into distinct free regions
        sheet
            .try_place(0, 0, Rect::new(150, 150), false, false, SplitRule::ShorterAxis)
            .unwrap();
        // Free: 50x150 (right) and 200x50 (bottom). A 40x40 piece wastes
        // less in the 50x150 rect.
        let scored = sheet
            .find_best(Rect::new(40, 40), false, FitPolicy::MinWaste)
            .unwrap();
        let chosen = sheet.free_rects[scored.free_idx];
        assert_eq!((chosen.width, chosen.height), (50, 150));
    }

    #[test]
    fn test_bottom_left_prefers_lowest_rect() {
        let mut sheet = Sheet::new(spec(200, 200, 0));
        sheet
            .try_place(0, 0, Rect::new(150, 150), false, false, SplitRule::ShorterAxis)
            .unwrap();
        let scored = sheet
            .find_best(Rect::new(40, 40), false, FitPolicy::BottomLeft)
            .unwrap();
        let chosen = sheet.free_rects[scored.free_idx];
        assert_eq!(chosen.y, 0);
    }

    #[test]
    fn test_flush_placement_leaves_single_remainder() {
        let mut sheet = Sheet::new(spec(100, 100, 0));
        sheet
            .try_place(0, 0, Rect::new(100, 40), false, false, SplitRule::ShorterAxis)
            .unwrap();
        assert_eq!(sheet.free_rects.len(), 1);
        assert_eq!(sheet.free_rects[0].area(), 100 * 60);
    }

    #[test]
    fn test_try_merge_vertical_neighbours() {
        let a = FreeRect {
            x: 20,
            y: 0,
            width: 30,
            height: 40,
        };
        let b = FreeRect {
            x: 20,
            y: 40,
            width: 30,
            height: 25,
        };
        let m = Sheet::try_merge(a, b).unwrap();
        assert_eq!(m, FreeRect {
            x: 20,
            y: 0,
            width: 30,
            height: 65,
        });
        // Not adjacent: same column but a gap in between
        let c = FreeRect {
            x: 20,
            y: 70,
            width: 30,
            height: 10,
        };
        assert!(Sheet::try_merge(a, c).is_none());
    }
}
