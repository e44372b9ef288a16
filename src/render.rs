use crate::types::SheetLayout;

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// Draws one sheet as an ASCII grid: placed pieces as labelled boxes,
/// reusable free regions shaded with dots.
pub fn render_sheet(layout: &SheetLayout) -> String {
    let scale = f64::min(
        MAX_WIDTH / layout.width as f64,
        MAX_HEIGHT / layout.height as f64,
    );
    let grid_w = (layout.width as f64 * scale).round() as usize;
    let grid_h = (layout.height as f64 * scale).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];

    // Shade free regions first so piece borders draw over them
    for free in &layout.free_rectangles {
        let x0 = (free.x as f64 * scale).round() as usize;
        let y0 = (free.y as f64 * scale).round() as usize;
        let x1 = ((free.x + free.width) as f64 * scale).round() as usize;
        let y1 = ((free.y + free.height) as f64 * scale).round() as usize;
        for row in grid.iter_mut().take(y1.min(grid_h)).skip(y0 + 1) {
            for cell in row.iter_mut().take(x1.min(grid_w)).skip(x0 + 1) {
                *cell = '.';
            }
        }
    }

    draw_box(&mut grid, 0, 0, grid_w, grid_h);

    for piece in &layout.placed_pieces {
        let sx = (piece.x as f64 * scale).round() as usize;
        let sy = (piece.y as f64 * scale).round() as usize;
        let sw = (piece.width as f64 * scale).round() as usize;
        let sh = (piece.height as f64 * scale).round() as usize;
        if sw == 0 || sh == 0 {
            continue;
        }

        draw_box(&mut grid, sx, sy, sw, sh);

        let mut label = format!("{}x{}", piece.width, piece.height);
        if piece.rotated {
            label.push('R');
        }
        let chars: Vec<char> = label.chars().collect();
        if sw > 2 && sh > 0 {
            let cy = sy + sh / 2;
            let start_x = (sx + sw / 2).saturating_sub(chars.len() / 2);
            for (i, &ch) in chars.iter().enumerate() {
                let x = start_x + i;
                if x > sx && x < sx + sw && cy > sy && cy < sy + sh {
                    grid[cy][x] = ch;
                }
            }
        }
    }

    let mut out = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn draw_box(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = if rows > 0 { grid[0].len() } else { return };

    for i in x..=x + w {
        if i >= cols {
            break;
        }
        for &row in &[y, y + h] {
            if row < rows {
                grid[row][i] = match grid[row][i] {
                    '|' | '+' => '+',
                    _ => '-',
                };
            }
        }
    }
    for j in y..=y + h {
        if j >= rows {
            break;
        }
        for &col in &[x, x + w] {
            if col < cols {
                grid[j][col] = match grid[j][col] {
                    '-' | '+' => '+',
                    _ => '|',
                };
            }
        }
    }
    for &cx in &[x, x + w] {
        for &cy in &[y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}
