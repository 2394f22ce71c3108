pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const USER_FIELD_LENGTH: usize = 150;
pub const EMAIL_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const RECIPE_NAME_LENGTH: usize = 256;
pub const RECIPE_TEXT_LENGTH: usize = 1500;

pub const RESERVED_USERNAMES: &[&str] = &["me"];

pub const RECIPE_SLUG_LENGTH: usize = 6;

pub const AVATAR_DIR: &str = "avatars";
pub const RECIPE_IMAGE_DIR: &str = "recipes";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
