mod device;
mod frames;
mod modes;
