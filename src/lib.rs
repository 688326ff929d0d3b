pub mod prelude {
    pub use vendor::prelude::*;
}

#[cfg(feature = "index")] pub use bucket_index::{self, *};
