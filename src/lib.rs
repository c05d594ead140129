use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};

pub mod solver;

/// Represents a 2D coordinate on the minesweeper board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub const fn new(x: usize, y: usize) -> Self {
        Point { x, y }
    }
}

/// The visible state of a single cell. This is the only per-cell state that
/// changes after construction; mine placement and the derived neighbor
/// counts are fixed for the lifetime of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Flagged,
    Opened,
}

/// Recoverable, caller-fault errors from the board API. The board never
/// mutates itself on a rejected call, so a caller holding a stale move list
/// can detect the staleness and rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("({}, {}) is outside a {width}x{height} board", at.x, at.y)]
    OutOfBounds {
        at: Point,
        width: usize,
        height: usize,
    },
    #[error("cell ({}, {}) is already opened", .0.x, .0.y)]
    AlreadyOpened(Point),
    #[error("cell ({}, {}) is flagged", .0.x, .0.y)]
    Flagged(Point),
    #[error("{mines} mines do not fit on a {width}x{height} board")]
    TooManyMines {
        width: usize,
        height: usize,
        mines: usize,
    },
}

/// The game board: mine layout, per-cell neighbor-mine counts ("frequency"),
/// and per-cell visibility.
///
/// The three grids are private. Reads go through bounds-checked queries and
/// the only mutations the board exposes are [`Board::open`] (including its
/// flood-open cascade) and the narrow Hidden→Flagged transition of
/// [`Board::flag`], so no other component can hold a copy that drifts out
/// of sync.
#[derive(Clone)]
pub struct Board {
    width: usize,
    height: usize,
    total_mines: usize,
    mines: Vec<Vec<bool>>,
    frequency: Vec<Vec<u8>>,
    visibility: Vec<Vec<Visibility>>,
}

impl Board {
    /// Creates a board with `mine_count` mines placed uniformly at random
    /// without replacement, then derives the frequency grid.
    pub fn new(width: usize, height: usize, mine_count: usize) -> Result<Self, BoardError> {
        Self::check_mine_count(width, height, mine_count)?;

        let mut positions: Vec<Point> = (0..height)
            .flat_map(|y| (0..width).map(move |x| Point::new(x, y)))
            .collect();
        positions.shuffle(&mut rand::rng());

        let mut mines = vec![vec![false; width]; height];
        for p in positions.into_iter().take(mine_count) {
            mines[p.y][p.x] = true;
        }

        Ok(Self::from_mine_grid(width, height, mines))
    }

    /// Creates a board with an explicit mine layout. Used by tests and
    /// scripted scenarios where the random placement of [`Board::new`]
    /// would get in the way.
    pub fn with_mines(width: usize, height: usize, mines: &[Point]) -> Result<Self, BoardError> {
        let mut grid = vec![vec![false; width]; height];
        for &p in mines {
            if p.x >= width || p.y >= height {
                return Err(BoardError::OutOfBounds {
                    at: p,
                    width,
                    height,
                });
            }
            grid[p.y][p.x] = true;
        }
        let placed = grid.iter().flatten().filter(|&&m| m).count();
        Self::check_mine_count(width, height, placed)?;

        Ok(Self::from_mine_grid(width, height, grid))
    }

    fn check_mine_count(width: usize, height: usize, mines: usize) -> Result<(), BoardError> {
        if width == 0 || height == 0 || mines >= width * height {
            return Err(BoardError::TooManyMines {
                width,
                height,
                mines,
            });
        }
        Ok(())
    }

    /// Derives the frequency grid from a finished mine grid. Frequency is
    /// computed exactly once; nothing may recompute it later.
    fn from_mine_grid(width: usize, height: usize, mines: Vec<Vec<bool>>) -> Self {
        let total_mines = mines.iter().flatten().filter(|&&m| m).count();
        let mut board = Board {
            width,
            height,
            total_mines,
            mines,
            frequency: vec![vec![0; width]; height],
            visibility: vec![vec![Visibility::Hidden; width]; height],
        };

        for p in board.positions().collect::<Vec<_>>() {
            let count = board
                .neighbors(p)
                .into_iter()
                .filter(|&n| board.mines[n.y][n.x])
                .count();
            board.frequency[p.y][p.x] = count as u8;
        }

        board
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of mines on the board, fixed at construction.
    pub fn total_mines(&self) -> usize {
        self.total_mines
    }

    /// All board positions in row-major scan order.
    pub fn positions(&self) -> impl Iterator<Item = Point> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| Point::new(x, y)))
    }

    fn check_bounds(&self, p: Point) -> Result<(), BoardError> {
        if p.x < self.width && p.y < self.height {
            Ok(())
        } else {
            Err(BoardError::OutOfBounds {
                at: p,
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn visibility(&self, p: Point) -> Result<Visibility, BoardError> {
        self.check_bounds(p)?;
        Ok(self.visibility[p.y][p.x])
    }

    pub fn frequency(&self, p: Point) -> Result<u8, BoardError> {
        self.check_bounds(p)?;
        Ok(self.frequency[p.y][p.x])
    }

    pub fn is_mine(&self, p: Point) -> Result<bool, BoardError> {
        self.check_bounds(p)?;
        Ok(self.mines[p.y][p.x])
    }

    // Infallible accessors for positions produced by the board's own
    // iterators, which are in bounds by construction.

    pub(crate) fn vis(&self, p: Point) -> Visibility {
        self.visibility[p.y][p.x]
    }

    pub(crate) fn freq(&self, p: Point) -> u8 {
        self.frequency[p.y][p.x]
    }

    /// The up-to-8 in-bounds neighbors of `p`, in fixed scan order.
    pub fn neighbors(&self, p: Point) -> Vec<Point> {
        let mut result = Vec::with_capacity(8);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = p.x as i64 + dx;
                let ny = p.y as i64 + dy;
                if nx >= 0 && nx < self.width as i64 && ny >= 0 && ny < self.height as i64 {
                    result.push(Point::new(nx as usize, ny as usize));
                }
            }
        }
        result
    }

    /// Neighbors of `p` that are still Hidden.
    pub fn hidden_neighbors(&self, p: Point) -> Vec<Point> {
        self.neighbors(p)
            .into_iter()
            .filter(|&n| self.vis(n) == Visibility::Hidden)
            .collect()
    }

    /// Neighbors of `p` that are Flagged.
    pub fn flagged_neighbors(&self, p: Point) -> Vec<Point> {
        self.neighbors(p)
            .into_iter()
            .filter(|&n| self.vis(n) == Visibility::Flagged)
            .collect()
    }

    /// Marks a Hidden cell as Flagged. This is the only mutation the
    /// deduction engine is granted; any other transition is rejected.
    pub fn flag(&mut self, p: Point) -> Result<(), BoardError> {
        match self.visibility(p)? {
            Visibility::Hidden => {
                self.visibility[p.y][p.x] = Visibility::Flagged;
                Ok(())
            }
            Visibility::Flagged => Err(BoardError::Flagged(p)),
            Visibility::Opened => Err(BoardError::AlreadyOpened(p)),
        }
    }

    /// Opens a Hidden cell and returns `true` if it held a mine. Deciding
    /// what a mine hit means (the loss condition) is the caller's business.
    ///
    /// Opening a safe zero-frequency cell flood-opens the whole connected
    /// zero region plus the single ring of numbered cells bordering it.
    /// Opening an already-Opened or Flagged cell is rejected so a caller
    /// can detect a stale move list.
    pub fn open(&mut self, p: Point) -> Result<bool, BoardError> {
        match self.visibility(p)? {
            Visibility::Opened => return Err(BoardError::AlreadyOpened(p)),
            Visibility::Flagged => return Err(BoardError::Flagged(p)),
            Visibility::Hidden => self.visibility[p.y][p.x] = Visibility::Opened,
        }

        if self.mines[p.y][p.x] {
            return Ok(true);
        }
        if self.frequency[p.y][p.x] == 0 {
            self.flood_open(p);
        }
        Ok(false)
    }

    /// Breadth-first reveal from an already-opened zero-frequency cell.
    /// Expansion only continues through zero-frequency cells, so the ring
    /// of numbered cells around the zero region is opened but never crossed
    /// and a mine is never reached (a zero cell has no mine neighbors).
    fn flood_open(&mut self, start: Point) {
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(p) = queue.pop_front() {
            if self.frequency[p.y][p.x] != 0 {
                continue;
            }
            for n in self.neighbors(p) {
                if visited.insert(n) && self.vis(n) == Visibility::Hidden {
                    self.visibility[n.y][n.x] = Visibility::Opened;
                    queue.push_back(n);
                }
            }
        }
    }

    /// Mines not yet accounted for by flags.
    pub fn remaining_mines(&self) -> usize {
        let flagged = self
            .visibility
            .iter()
            .flatten()
            .filter(|&&v| v == Visibility::Flagged)
            .count();
        self.total_mines.saturating_sub(flagged)
    }

    /// True iff every non-mine cell has been opened.
    pub fn is_won(&self) -> bool {
        let opened = self
            .visibility
            .iter()
            .flatten()
            .filter(|&&v| v == Visibility::Opened)
            .count();
        opened == self.width * self.height - self.total_mines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_initialization() {
        let board = Board::new(5, 5, 3).unwrap();
        assert_eq!(board.width(), 5);
        assert_eq!(board.height(), 5);
        assert_eq!(board.total_mines(), 3);

        let mines = board
            .positions()
            .filter(|&p| board.is_mine(p).unwrap())
            .count();
        assert_eq!(mines, 3);

        for p in board.positions() {
            assert_eq!(board.visibility(p).unwrap(), Visibility::Hidden);
        }
    }

    #[test]
    fn test_too_many_mines_rejected() {
        assert!(matches!(
            Board::new(3, 3, 9),
            Err(BoardError::TooManyMines { mines: 9, .. })
        ));
        assert!(matches!(
            Board::new(0, 5, 0),
            Err(BoardError::TooManyMines { .. })
        ));
    }

    #[test]
    fn test_with_mines_out_of_bounds() {
        assert!(matches!(
            Board::with_mines(3, 3, &[Point::new(3, 0)]),
            Err(BoardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_neighbor_counts() {
        let board = Board::new(3, 3, 1).unwrap();
        // Corner, edge, center.
        assert_eq!(board.neighbors(Point::new(0, 0)).len(), 3);
        assert_eq!(board.neighbors(Point::new(1, 0)).len(), 5);
        assert_eq!(board.neighbors(Point::new(1, 1)).len(), 8);
    }

    #[test]
    fn test_frequency_invariant_random_boards() {
        for _ in 0..20 {
            let board = Board::new(8, 8, 10).unwrap();
            for p in board.positions() {
                let expected = board
                    .neighbors(p)
                    .into_iter()
                    .filter(|&n| board.is_mine(n).unwrap())
                    .count();
                assert_eq!(board.frequency(p).unwrap() as usize, expected);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_queries() {
        let board = Board::new(4, 4, 2).unwrap();
        let outside = Point::new(4, 1);
        assert!(matches!(
            board.visibility(outside),
            Err(BoardError::OutOfBounds { .. })
        ));
        assert!(matches!(
            board.frequency(outside),
            Err(BoardError::OutOfBounds { .. })
        ));
    }

    /// 6x6 board with a mine-free 3x3 corner: opening (0, 0) flood-opens
    /// the whole zero-frequency block plus the single ring of numbered
    /// cells bordering it, and nothing beyond.
    #[test]
    fn test_flood_open_zero_region_and_ring() {
        // Mines along row and column 4 keep the 3x3 corner at frequency 0
        // and give every ring cell (row or column 3) a nonzero count.
        let mines = [
            Point::new(4, 0),
            Point::new(4, 2),
            Point::new(4, 4),
            Point::new(2, 4),
            Point::new(0, 4),
        ];
        let mut board = Board::with_mines(6, 6, &mines).unwrap();

        assert_eq!(board.frequency(Point::new(1, 1)).unwrap(), 0);
        assert_eq!(board.frequency(Point::new(3, 1)).unwrap(), 2);

        let hit = board.open(Point::new(0, 0)).unwrap();
        assert!(!hit);

        for p in board.positions() {
            let expected = if p.x <= 3 && p.y <= 3 {
                Visibility::Opened
            } else {
                Visibility::Hidden
            };
            assert_eq!(board.visibility(p).unwrap(), expected, "at {p:?}");
        }
        assert!(!board.is_won());
    }

    #[test]
    fn test_open_rejects_opened_and_flagged() {
        let mut board = Board::with_mines(3, 3, &[Point::new(0, 0)]).unwrap();

        board.open(Point::new(1, 0)).unwrap();
        assert_eq!(
            board.open(Point::new(1, 0)),
            Err(BoardError::AlreadyOpened(Point::new(1, 0)))
        );

        board.flag(Point::new(0, 0)).unwrap();
        assert_eq!(
            board.open(Point::new(0, 0)),
            Err(BoardError::Flagged(Point::new(0, 0)))
        );
        assert!(matches!(
            board.open(Point::new(7, 7)),
            Err(BoardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_flag_transitions() {
        let mut board = Board::with_mines(3, 3, &[Point::new(0, 0)]).unwrap();

        board.flag(Point::new(0, 0)).unwrap();
        assert_eq!(board.visibility(Point::new(0, 0)).unwrap(), Visibility::Flagged);
        assert_eq!(
            board.flag(Point::new(0, 0)),
            Err(BoardError::Flagged(Point::new(0, 0)))
        );

        board.open(Point::new(1, 1)).unwrap();
        assert_eq!(
            board.flag(Point::new(1, 1)),
            Err(BoardError::AlreadyOpened(Point::new(1, 1)))
        );
        assert_eq!(board.remaining_mines(), 0);
    }

    #[test]
    fn test_open_mine_reports_hit() {
        let mut board = Board::with_mines(2, 2, &[Point::new(0, 0)]).unwrap();
        assert!(board.open(Point::new(0, 0)).unwrap());
        assert_eq!(board.visibility(Point::new(0, 0)).unwrap(), Visibility::Opened);
    }

    #[test]
    fn test_win_check() {
        let mut board = Board::with_mines(2, 2, &[Point::new(0, 0)]).unwrap();
        for p in [Point::new(1, 0), Point::new(0, 1)] {
            board.open(p).unwrap();
            assert!(!board.is_won());
        }
        board.open(Point::new(1, 1)).unwrap();
        assert!(board.is_won());
    }
}
