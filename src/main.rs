use minesweeper_agent::solver::Solver;
use minesweeper_agent::{Board, Point, Visibility};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // --- 1. Initialization ---
    let mut board = Board::new(9, 9, 10)?;
    let mut solver = Solver::new();

    println!("--- Autonomous Minesweeper Agent ---");
    println!("Strategy: provably safe moves when they exist, lowest-risk guess otherwise.");
    print_board(&board);

    // --- 2. Game Loop ---
    let mut turn = 0;
    loop {
        turn += 1;

        let moves = solver.make_move(&mut board)?;
        if moves.is_empty() {
            break;
        }
        println!("\n--- Turn #{}: opening {} cell(s) ---", turn, moves.len());

        // --- 3. Apply the Chosen Moves ---
        for p in moves {
            // An earlier move this turn may have flood-opened this cell.
            if board.visibility(p)? == Visibility::Opened {
                continue;
            }
            if board.open(p)? {
                print_board(&board);
                println!("\nHit a mine at ({}, {}). The agent lost.", p.x, p.y);
                return Ok(());
            }
        }
        print_board(&board);

        if board.is_won() {
            break;
        }
    }

    // --- 4. Final Result ---
    println!("\nAll safe cells opened. The agent won!");
    Ok(())
}

fn print_board(board: &Board) {
    // Print header
    print!("   ");
    for x in 0..board.width() {
        print!("{:^3}", x);
    }
    println!("\n  +{}", "---".repeat(board.width()));

    // Print rows
    for y in 0..board.height() {
        print!("{:^2}|", y);
        for x in 0..board.width() {
            let p = Point::new(x, y);
            let display = match board.visibility(p).unwrap() {
                Visibility::Hidden => " ■ ".to_string(),
                Visibility::Flagged => " ⚑ ".to_string(),
                Visibility::Opened if board.is_mine(p).unwrap() => " * ".to_string(),
                Visibility::Opened => format!(" {} ", board.frequency(p).unwrap()),
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}
