pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_UNIT_AMOUNT: i32 = 1;
pub const MAX_UNIT_AMOUNT: i32 = 32000;

pub const MAX_NAME_LENGTH: usize = 200;

pub const DEFAULT_TAG_COLOR: &str = "#49B64E";

pub const SHOPPING_LIST_HEADER: &str = "Список покупок:";

pub const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;
