mod shepperd;
