use crate::types::{Tile, TileCode};

#[derive(Clone, Debug, PartialEq)]
pub struct Layer<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

pub type Grid = Layer<i32>;

impl<T: Copy> Layer<T> {
    pub fn filled(width: i32, height: i32, value: T) -> Self {
        let len = (width.max(0) * height.max(0)) as usize;
        Self {
            width: width.max(0),
            height: height.max(0),
            cells: vec![value; len],
        }
    }

    pub fn from_cells(width: i32, height: i32, cells: Vec<T>) -> Option<Self> {
        if width < 0 || height < 0 || cells.len() != (width * height) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, tile: Tile) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    pub fn index_of(&self, tile: Tile) -> Option<usize> {
        if !self.contains(tile) {
            return None;
        }
        Some((tile.y * self.width + tile.x) as usize)
    }

    pub fn tile_at(&self, index: usize) -> Tile {
        let index = index as i32;
        Tile::new(index % self.width, index / self.width)
    }

    pub fn get(&self, tile: Tile) -> Option<T> {
        self.index_of(tile).map(|idx| self.cells[idx])
    }

    pub fn set(&mut self, tile: Tile, value: T) -> bool {
        match self.index_of(tile) {
            Some(idx) => {
                self.cells[idx] = value;
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn tiles(&self) -> impl DoubleEndedIterator<Item = Tile> + '_ {
        (0..self.cells.len()).map(|idx| self.tile_at(idx))
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Layer<U> {
        Layer {
            width: self.width,
            height: self.height,
            cells: self.cells.iter().map(|value| f(*value)).collect(),
        }
    }
}

impl Grid {
    pub fn code(&self, tile: Tile) -> TileCode {
        self.get(tile)
            .map(TileCode::from_code)
            .unwrap_or(TileCode::Impassable)
    }

    pub fn set_code(&mut self, tile: Tile, code: TileCode) -> bool {
        self.set(tile, code.code())
    }

    /// Builds a grid from ASCII rows: `#` wall, `x` block, `.` empty,
    /// `*` active fire, `b` bomb sentinel, digits `1-9` a hazard of that many
    /// hundred milliseconds, `f` fire-up, `m` max fire, `s` skull, `e` egg,
    /// `k` kick. Unknown characters are impassable.
    pub fn from_ascii(rows: &[&str]) -> Option<Self> {
        let height = rows.len() as i32;
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0) as i32;
        let mut cells = Vec::with_capacity((width * height) as usize);
        for row in rows {
            if row.chars().count() as i32 != width {
                return None;
            }
            cells.extend(row.chars().map(ascii_code));
        }
        Self::from_cells(width, height, cells)
    }
}

fn ascii_code(c: char) -> i32 {
    use crate::types::ItemKind;
    let code = match c {
        '#' => TileCode::Wall,
        'x' => TileCode::Block,
        '.' => TileCode::Empty,
        '*' => TileCode::Hazard(0),
        'b' => TileCode::Bomb,
        'f' => TileCode::Item(ItemKind::FireUp),
        'm' => TileCode::Item(ItemKind::MaxFire),
        's' => TileCode::Item(ItemKind::Skull),
        'e' => TileCode::Item(ItemKind::Egg),
        'k' => TileCode::Item(ItemKind::Kick),
        digit @ '1'..='9' => TileCode::Hazard((digit as i32 - '0' as i32) * 100),
        _ => TileCode::Impassable,
    };
    code.code()
}
