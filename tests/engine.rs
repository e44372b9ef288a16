use panel_optimizer::types::{Optimization, Part, SheetSpec, UnplacedReason};
use panel_optimizer::{Budget, GaConfig, Solver, SolverConfig};

fn part(id: &str, w: u32, h: u32, qty: u32, rotate: bool) -> Part {
    Part {
        id: id.to_string(),
        width: w,
        height: h,
        quantity: qty,
        rotation_allowed: rotate,
        gaddi_mark: false,
        laminate_code: None,
        nominal_width: None,
        nominal_height: None,
    }
}

fn spec(width: u32, height: u32, kerf: u32) -> SheetSpec {
    SheetSpec {
        width,
        height,
        kerf,
    }
}

fn fast_config() -> SolverConfig {
    SolverConfig::default()
        .with_budget(Budget::Generations(4))
        .with_ga(GaConfig::default().with_population_size(20))
}

/// Validates the structural invariants every result must satisfy: piece
/// conservation, in-bounds placements, no overlapping pieces, rotation
/// locks respected, efficiency within range.
fn assert_result_valid(result: &Optimization, parts: &[Part]) {
    let total_input: usize = parts.iter().map(|p| p.quantity as usize).sum();
    assert_eq!(result.validation.total_input, total_input);
    assert_eq!(
        result.validation.total_placed + result.validation.total_unplaced,
        total_input,
        "pieces lost or duplicated"
    );
    assert!(result.validation.all_accounted_for);
    assert_eq!(result.validation.pieces_lost, 0);

    let placed: usize = result.sheets.iter().map(|s| s.placed_pieces.len()).sum();
    assert_eq!(placed, result.validation.total_placed);

    assert!(result.totals.efficiency_percent >= 0.0);
    assert!(result.totals.efficiency_percent <= 100.0);
    if result.totals.sheet_count == 0 {
        assert_eq!(result.totals.efficiency_percent, 0.0);
    } else {
        assert!(result.totals.efficiency_percent > 0.0);
    }

    for (si, sheet) in result.sheets.iter().enumerate() {
        assert!(
            !sheet.placed_pieces.is_empty(),
            "sheet {si} was opened but holds nothing"
        );
        for (pi, p) in sheet.placed_pieces.iter().enumerate() {
            assert!(
                p.x + p.width <= sheet.width && p.y + p.height <= sheet.height,
                "sheet {si}, piece {pi} exceeds sheet bounds"
            );
            if p.rotated {
                assert!(
                    parts[p.part].rotation_allowed,
                    "sheet {si}, piece {pi} rotated against its grain lock"
                );
            }
        }
        for i in 0..sheet.placed_pieces.len() {
            for j in (i + 1)..sheet.placed_pieces.len() {
                let a = &sheet.placed_pieces[i];
                let b = &sheet.placed_pieces[j];
                let overlaps = a.x < b.x + b.width
                    && b.x < a.x + a.width
                    && a.y < b.y + b.height
                    && b.y < a.y + a.height;
                assert!(!overlaps, "sheet {si}: pieces {i} and {j} overlap");
            }
        }
    }
}

#[test]
fn eight_squares_on_one_sheet() {
    let parts = vec![part("sq", 400, 400, 8, true)];
    let solver = Solver::new(spec(1210, 2420, 5), parts.clone()).with_config(fast_config());
    let result = solver.solve_seeded(2).unwrap();
    assert_result_valid(&result, &parts);
    assert_eq!(result.totals.sheet_count, 1);
    assert_eq!(result.validation.total_placed, 8);
    assert!(result.unplaced.is_empty());
}

#[test]
fn oversized_piece_is_reported_and_accounted() {
    let parts = vec![part("beam", 3000, 500, 1, false)];
    let solver = Solver::new(spec(1210, 2420, 5), parts.clone()).with_config(fast_config());
    let result = solver.solve_seeded(2).unwrap();
    assert_result_valid(&result, &parts);
    assert_eq!(result.validation.total_placed, 0);
    assert_eq!(result.validation.total_unplaced, 1);
    assert_eq!(result.unplaced[0].id, "beam");
    assert_eq!(result.unplaced[0].reason, UnplacedReason::TooLarge);
}

#[test]
fn grain_locked_pieces_never_rotate() {
    let parts = vec![
        part("locked", 600, 600, 10, false),
        part("free", 600, 600, 10, true),
    ];
    for seed in [1u64, 17, 99] {
        let solver = Solver::new(spec(1210, 2420, 5), parts.clone()).with_config(fast_config());
        let result = solver.solve_seeded(seed).unwrap();
        assert_result_valid(&result, &parts);
        for sheet in &result.sheets {
            for piece in &sheet.placed_pieces {
                if piece.part == 0 {
                    assert!(!piece.rotated);
                }
            }
        }
    }
}

#[test]
fn mixed_cabinet_batch_is_conserved() {
    let parts = vec![
        part("carcass-side", 720, 560, 10, false),
        part("carcass-top", 860, 560, 5, true),
        part("shelf", 828, 500, 12, true),
        part("door", 715, 446, 8, false),
        part("back-panel", 900, 740, 5, true),
        part("drawer-front", 500, 180, 10, true),
    ];
    let total: u32 = parts.iter().map(|p| p.quantity).sum();
    assert_eq!(total, 50);

    let solver = Solver::new(spec(2440, 1220, 4), parts.clone()).with_config(fast_config());
    let result = solver.solve_seeded(42).unwrap();
    assert_result_valid(&result, &parts);
    assert_eq!(
        result.validation.total_placed + result.validation.total_unplaced,
        50
    );

    // Area lower bound on sheet count
    let placed_area: u64 = result
        .sheets
        .iter()
        .flat_map(|s| &s.placed_pieces)
        .map(|p| p.width as u64 * p.height as u64)
        .sum();
    let min_sheets = placed_area.div_ceil(2440 * 1220) as usize;
    assert!(result.totals.sheet_count >= min_sheets);
}

#[test]
fn zero_parts_yield_empty_result() {
    let solver = Solver::new(spec(1210, 2420, 5), vec![]);
    let result = solver.solve_seeded(1).unwrap();
    assert!(result.sheets.is_empty());
    assert!(result.unplaced.is_empty());
    assert_eq!(result.totals.sheet_count, 0);
    assert_eq!(result.totals.efficiency_percent, 0.0);
    assert!(result.validation.all_accounted_for);
}

#[test]
fn seeded_solve_is_reproducible() {
    let parts = vec![
        part("a", 450, 320, 6, true),
        part("b", 380, 380, 4, false),
        part("c", 900, 240, 5, true),
    ];
    let solver = Solver::new(spec(2440, 1220, 3), parts).with_config(fast_config());
    let first = serde_json::to_value(solver.solve_seeded(7).unwrap()).unwrap();
    let second = serde_json::to_value(solver.solve_seeded(7).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn rotation_recovers_otherwise_unplaceable_pieces() {
    // 2000x400 only fits the 1210-wide sheet when rotated
    let parts = vec![part("stretcher", 2000, 400, 2, true)];
    let solver = Solver::new(spec(1210, 2420, 5), parts.clone()).with_config(fast_config());
    let result = solver.solve_seeded(3).unwrap();
    assert_result_valid(&result, &parts);
    assert_eq!(result.validation.total_placed, 2);
    for sheet in &result.sheets {
        for piece in &sheet.placed_pieces {
            assert!(piece.rotated);
        }
    }
}

#[test]
fn solver_accepts_json_request() {
    let request: panel_optimizer::OptimizeRequest = serde_json::from_str(
        r#"{
            "sheet": {"width": 1210, "height": 2420, "kerf": 5},
            "parts": [
                {"id": "shelf", "width": 800, "height": 400, "quantity": 4},
                {"id": "door", "width": 715, "height": 446, "quantity": 2, "rotationAllowed": false}
            ],
            "timeBudgetMs": 50
        }"#,
    )
    .unwrap();
    let parts = request.parts.clone();
    let result = Solver::from_request(request).solve_seeded(8).unwrap();
    assert_result_valid(&result, &parts);
    assert_eq!(result.validation.total_input, 6);
    assert_eq!(result.validation.total_placed, 6);
}

#[test]
fn result_serializes_with_contract_field_names() {
    let parts = vec![part("p", 300, 300, 2, true)];
    let solver = Solver::new(spec(1210, 2420, 5), parts).with_config(fast_config());
    let json = serde_json::to_string(&solver.solve_seeded(1).unwrap()).unwrap();
    for key in [
        "sheets",
        "placedPieces",
        "freeRectangles",
        "totals",
        "sheetCount",
        "efficiencyPercent",
        "wastePercent",
        "unplaced",
        "validation",
        "totalInput",
        "totalPlaced",
        "totalUnplaced",
        "piecesLost",
        "allAccountedFor",
    ] {
        assert!(json.contains(key), "missing contract key {key}");
    }
}
