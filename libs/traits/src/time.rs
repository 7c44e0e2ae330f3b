// Copyright 2021 Centrifuge Foundation (centrifuge.io).
// This file is part of Centrifuge chain project.

// Centrifuge is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).

// Centrifuge is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

use frame_support::traits::UnixTime;

/// Unix time expressed in seconds
pub type Seconds = u64;

/// Unix time expressed in milliseconds, as `pallet_timestamp` stores it
pub type Millis = u64;

/// Trait to obtain the time as seconds
pub trait TimeAsSecs: UnixTime {
	fn now() -> Seconds {
		<Self as UnixTime>::now().as_secs()
	}
}

impl<T: UnixTime> TimeAsSecs for T {}

/// Seconds elapsed between `from` and `to`, zero if `to` lies before `from`.
pub fn elapsed(from: Seconds, to: Seconds) -> Seconds {
	to.saturating_sub(from)
}
